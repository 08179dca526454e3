//! # Cart Actor
//!
//! Single owner of the in-progress [`Cart`].
//!
//! ```text
//! ┌──────────┐                                                 ┌───────────┐
//! │ manual   │──┐                                          ┌──►│ watch     │
//! ├──────────┤  │   mpsc (bounded)    ┌──────────────┐     │   │ CartView  │
//! │ scanner  │──┼───────────────────► │  CartActor   │─────┘   └───────────┘
//! ├──────────┤  │  CartCommand +      │  owns Cart   │
//! │ scale    │──┤  oneshot reply      │  one command │
//! ├──────────┤  │                     │  at a time   │
//! │ checkout │──┘                     └──────────────┘
//! └──────────┘
//! ```
//!
//! Commands are applied strictly in arrival order, so appends from the
//! three input producers never interleave. Every applied command
//! publishes a fresh [`CartView`].

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use mostrador_core::{
    Cart, CartLine, CartTotals, ClientContext, CoreResult, LineRequest, Money, Percent, Quantity,
};

use crate::error::{EngineError, EngineResult};

const MAILBOX_SIZE: usize = 64;

/// Read-only snapshot published after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub cart: Cart,
    pub totals: CartTotals,
}

impl CartView {
    fn of(cart: &Cart) -> Self {
        CartView {
            cart: cart.clone(),
            totals: cart.totals(),
        }
    }
}

enum CartCommand {
    Append {
        req: LineRequest,
        reply: oneshot::Sender<CoreResult<CartLine>>,
    },
    SetQuantity {
        line_id: String,
        quantity: Quantity,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    SetAmount {
        line_id: String,
        amount: Money,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    SetLineDiscount {
        line_id: String,
        pct: Percent,
        nominal: Money,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    RemoveLine {
        line_id: String,
        reply: oneshot::Sender<CoreResult<CartLine>>,
    },
    SetGlobalDiscount {
        pct: Percent,
        nominal: Money,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    SetClient {
        client: ClientContext,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Cart>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    ClearSubmitted {
        sold: Vec<String>,
        reply: oneshot::Sender<usize>,
    },
}

// =============================================================================
// Actor
// =============================================================================

pub struct CartActor {
    cart: Cart,
    rx: mpsc::Receiver<CartCommand>,
    view_tx: watch::Sender<CartView>,
}

impl CartActor {
    /// Creates the actor with an empty cart and returns its handle.
    pub fn new() -> (Self, CartHandle) {
        let cart = Cart::new();
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let (view_tx, view_rx) = watch::channel(CartView::of(&cart));

        (CartActor { cart, rx, view_tx }, CartHandle { tx, view_rx })
    }

    /// Runs until every handle is dropped. Spawn as a background task.
    pub async fn run(mut self) {
        debug!("Cart actor starting");
        while let Some(command) = self.rx.recv().await {
            let changed = self.apply(command);
            if changed {
                self.view_tx.send_replace(CartView::of(&self.cart));
            }
        }
        debug!("Cart actor stopped");
    }

    /// Applies one command; returns true when the cart may have changed.
    fn apply(&mut self, command: CartCommand) -> bool {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            CartCommand::Append { req, reply } => {
                let result = self.cart.append_line(req).map(|line| line.clone());
                let changed = result.is_ok();
                let _ = reply.send(result);
                changed
            }
            CartCommand::SetQuantity {
                line_id,
                quantity,
                reply,
            } => {
                let _ = reply.send(self.cart.set_quantity(&line_id, quantity));
                true
            }
            CartCommand::SetAmount {
                line_id,
                amount,
                reply,
            } => {
                let _ = reply.send(self.cart.set_amount(&line_id, amount));
                true
            }
            CartCommand::SetLineDiscount {
                line_id,
                pct,
                nominal,
                reply,
            } => {
                let _ = reply.send(self.cart.set_line_discount(&line_id, pct, nominal));
                true
            }
            CartCommand::RemoveLine { line_id, reply } => {
                let _ = reply.send(self.cart.remove_line(&line_id));
                true
            }
            CartCommand::SetGlobalDiscount {
                pct,
                nominal,
                reply,
            } => {
                let _ = reply.send(self.cart.set_global_discount(pct, nominal));
                true
            }
            CartCommand::SetClient { client, reply } => {
                self.cart.set_client(client);
                let _ = reply.send(());
                true
            }
            CartCommand::Snapshot { reply } => {
                let _ = reply.send(self.cart.clone());
                false
            }
            CartCommand::Reset { reply } => {
                info!(lines = self.cart.line_count(), "Cart reset");
                self.cart.clear();
                let _ = reply.send(());
                true
            }
            CartCommand::ClearSubmitted { sold, reply } => {
                let left = self.cart.clear_submitted(&sold);
                info!(sold = sold.len(), left, "Submitted lines cleared");
                let _ = reply.send(left);
                true
            }
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable sender side of the cart actor.
#[derive(Clone)]
pub struct CartHandle {
    tx: mpsc::Sender<CartCommand>,
    view_rx: watch::Receiver<CartView>,
}

impl CartHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CartCommand,
    ) -> EngineResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| EngineError::ShuttingDown)?;
        rx.await
            .map_err(|_| EngineError::ChannelError("Cart actor dropped the reply".into()))
    }

    /// Appends a line and returns it as stored.
    pub async fn append_line(&self, req: LineRequest) -> EngineResult<CartLine> {
        Ok(self
            .request(|reply| CartCommand::Append { req, reply })
            .await??)
    }

    pub async fn set_quantity(&self, line_id: &str, quantity: Quantity) -> EngineResult<()> {
        let line_id = line_id.to_string();
        Ok(self
            .request(|reply| CartCommand::SetQuantity {
                line_id,
                quantity,
                reply,
            })
            .await??)
    }

    /// Bulk lines only.
    pub async fn set_amount(&self, line_id: &str, amount: Money) -> EngineResult<()> {
        let line_id = line_id.to_string();
        Ok(self
            .request(|reply| CartCommand::SetAmount {
                line_id,
                amount,
                reply,
            })
            .await??)
    }

    pub async fn set_line_discount(
        &self,
        line_id: &str,
        pct: Percent,
        nominal: Money,
    ) -> EngineResult<()> {
        let line_id = line_id.to_string();
        Ok(self
            .request(|reply| CartCommand::SetLineDiscount {
                line_id,
                pct,
                nominal,
                reply,
            })
            .await??)
    }

    pub async fn remove_line(&self, line_id: &str) -> EngineResult<CartLine> {
        let line_id = line_id.to_string();
        Ok(self
            .request(|reply| CartCommand::RemoveLine { line_id, reply })
            .await??)
    }

    pub async fn set_global_discount(&self, pct: Percent, nominal: Money) -> EngineResult<()> {
        Ok(self
            .request(|reply| CartCommand::SetGlobalDiscount {
                pct,
                nominal,
                reply,
            })
            .await??)
    }

    pub async fn set_client(&self, client: ClientContext) -> EngineResult<()> {
        self.request(|reply| CartCommand::SetClient { client, reply })
            .await
    }

    /// The cart as it is after every command sent before this one.
    pub async fn snapshot(&self) -> EngineResult<Cart> {
        self.request(|reply| CartCommand::Snapshot { reply }).await
    }

    /// Drops every line and discount, whatever their origin.
    pub async fn reset(&self) -> EngineResult<()> {
        self.request(|reply| CartCommand::Reset { reply }).await
    }

    /// Removes the lines of `sold` and resets discounts and client.
    ///
    /// Lines appended after `sold` was taken survive. Returns how many
    /// lines are left.
    pub async fn clear_submitted(&self, sold: &Cart) -> EngineResult<usize> {
        let sold = sold.line_ids();
        self.request(|reply| CartCommand::ClearSubmitted { sold, reply })
            .await
    }

    /// Latest published view, without a round trip to the actor.
    pub fn view(&self) -> CartView {
        self.view_rx.borrow().clone()
    }

    /// A receiver notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.view_rx.clone()
    }
}
