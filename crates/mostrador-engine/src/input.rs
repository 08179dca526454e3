//! # Input Reconciler
//!
//! Turns the three input producers into cart appends.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Manual ─── ManualSelection (qty ⇄ amount) ── confirm ──┐               │
//! │                                                          │               │
//! │  Scanner ── ScannerBuffer ── terminator ─┬─ Search: keep buffer         │
//! │                                          └─ Scan(code) ──┤               │
//! │                                                          ▼               │
//! │  Scale ──── poll (1s) ── ScaleEvent ── resolve ──► CartHandle::append   │
//! │                                                          │               │
//! │                               LineAppended / InputRejected notice       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Event Resolution Order
//! 1. `id_articulo` present in the mirror
//! 2. `codigo` present in the mirror
//! 3. the configured default bulk product, when the event carries a weight
//! 4. the raw name and price carried by the event (ad-hoc line)
//! 5. otherwise the event is rejected
//!
//! A weighed event always produces a bulk line with `quantity = weight`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use mostrador_core::pricing::{bulk_amount_for, bulk_quantity_for, clamp_unit_quantity};
use mostrador_core::validation::validate_bulk_quantity;
use mostrador_core::{
    CartLine, CoreError, CoreResult, LineRequest, LineSource, Money, PriceList, Product, Quantity,
    SaleMode, ValidationError,
};

use crate::backend::Backend;
use crate::cart::CartHandle;
use crate::catalog::CatalogMirror;
use crate::error::{EngineError, EngineResult};
use crate::notice::{CheckoutEventEmitter, Notice};
use crate::wire::ScaleEvent;

/// Shortest buffer that may be a name search rather than a scan.
pub const SEARCH_MIN_CHARS: usize = 3;

// =============================================================================
// Manual Selection
// =============================================================================

/// The product picked in the manual picker, before it is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualSelection {
    product: Product,
    price_list: PriceList,
    mode: SaleMode,
    quantity: Quantity,
    amount: Money,
}

impl ManualSelection {
    /// One unit at the price of `list`.
    pub fn new(product: Product, price_list: PriceList) -> Self {
        let mode = product.sale_mode();
        let amount = product.price_for(price_list);
        ManualSelection {
            product,
            price_list,
            mode,
            quantity: Quantity::one(),
            amount,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn mode(&self) -> SaleMode {
        self.mode
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    fn unit_price(&self) -> Money {
        self.product.price_for(self.price_list)
    }

    /// Switches mode. Either switch starts again from one unit.
    pub fn set_mode(&mut self, mode: SaleMode) {
        self.mode = mode;
        self.quantity = Quantity::one();
        self.amount = self.unit_price();
    }

    /// Unit mode clamps to stock; bulk mode recomputes the amount.
    pub fn set_quantity(&mut self, quantity: Quantity) -> CoreResult<()> {
        match self.mode {
            SaleMode::Unit => {
                let units = clamp_unit_quantity(quantity.whole_units(), self.product.stock);
                self.quantity = Quantity::from_units(units);
                self.amount = self.unit_price() * units;
            }
            SaleMode::Bulk => {
                validate_bulk_quantity(quantity)?;
                self.quantity = quantity;
                self.amount = bulk_amount_for(quantity, self.unit_price());
            }
        }
        Ok(())
    }

    /// Bulk mode only: recomputes the quantity from the amount.
    pub fn set_amount(&mut self, amount: Money) -> CoreResult<()> {
        if self.mode != SaleMode::Bulk {
            return Err(CoreError::NotBulkLine(self.product.name.clone()));
        }
        if amount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "amount".to_string(),
            }
            .into());
        }
        let quantity = bulk_quantity_for(amount, self.unit_price()).ok_or_else(|| {
            ValidationError::MustBePositive {
                field: "unit_price".to_string(),
            }
        })?;
        self.quantity = quantity;
        self.amount = amount;
        Ok(())
    }

    pub fn to_request(&self) -> LineRequest {
        let mut req =
            LineRequest::from_product(&self.product, self.price_list, self.quantity, LineSource::Manual);
        req.mode = self.mode;
        req
    }
}

// =============================================================================
// Scanner Buffer
// =============================================================================

/// What a terminator keypress means for the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Empty buffer.
    Ignore,
    /// A typed name query; the buffer is kept for the picker.
    Search(String),
    /// A code to resolve; the buffer is cleared.
    Scan(String),
}

/// Keystrokes of the shared search/scan field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannerBuffer {
    text: String,
}

impl ScannerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        if !c.is_control() {
            self.text.push(c);
        }
    }

    pub fn push_str(&mut self, s: &str) {
        s.chars().for_each(|c| self.push(c));
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Classifies the buffer on a terminator keypress.
    ///
    /// An exact code in the mirror always scans. Otherwise a buffer of at
    /// least [`SEARCH_MIN_CHARS`] matching some product name is a search.
    pub async fn terminate(&mut self, catalog: &CatalogMirror) -> ScanOutcome {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            self.clear();
            return ScanOutcome::Ignore;
        }

        let known_code = catalog.find_by_code(&text).await.is_some();
        let name_matches = !known_code
            && text.chars().count() >= SEARCH_MIN_CHARS
            && catalog.has_name_matches(&text).await;

        let outcome = classify(text, known_code, name_matches);
        if matches!(outcome, ScanOutcome::Scan(_)) {
            self.clear();
        }
        outcome
    }
}

fn classify(text: String, known_code: bool, name_matches: bool) -> ScanOutcome {
    if known_code {
        ScanOutcome::Scan(text)
    } else if name_matches {
        ScanOutcome::Search(text)
    } else {
        ScanOutcome::Scan(text)
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Funnels every producer into the cart actor.
#[derive(Clone)]
pub struct InputReconciler {
    cart: CartHandle,
    catalog: CatalogMirror,
    backend: Arc<dyn Backend>,
    emitter: Arc<dyn CheckoutEventEmitter>,
    default_bulk_product_id: Option<i64>,
}

impl InputReconciler {
    pub fn new(
        cart: CartHandle,
        catalog: CatalogMirror,
        backend: Arc<dyn Backend>,
        emitter: Arc<dyn CheckoutEventEmitter>,
        default_bulk_product_id: Option<i64>,
    ) -> Self {
        InputReconciler {
            cart,
            catalog,
            backend,
            emitter,
            default_bulk_product_id,
        }
    }

    /// Price list of the cart's current client.
    fn price_list(&self) -> PriceList {
        self.cart.view().cart.client.price_list()
    }

    /// Starts a manual selection priced for the current client.
    pub fn select(&self, product: Product) -> ManualSelection {
        ManualSelection::new(product, self.price_list())
    }

    /// Confirms a manual selection.
    pub async fn add_manual(&self, selection: &ManualSelection) -> EngineResult<CartLine> {
        self.append(selection.to_request()).await
    }

    /// Resolves a scanned code and appends one unit.
    ///
    /// `Ok(None)` when no product carries the code.
    pub async fn submit_scan(&self, code: &str) -> EngineResult<Option<CartLine>> {
        let product = match self.catalog.lookup_code(code).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                self.reject(LineSource::Scanner, format!("No product with code {}", code.trim()));
                return Ok(None);
            }
            Err(e) => {
                self.reject(LineSource::Scanner, e.user_message());
                return Err(e);
            }
        };

        let req = LineRequest::from_product(
            &product,
            self.price_list(),
            Quantity::one(),
            LineSource::Scanner,
        );
        self.append(req).await.map(Some)
    }

    /// Handles a terminator keypress on the scanner field.
    pub async fn terminate_scanner(&self, buffer: &mut ScannerBuffer) -> EngineResult<ScanOutcome> {
        let outcome = buffer.terminate(&self.catalog).await;
        if let ScanOutcome::Scan(code) = &outcome {
            self.submit_scan(code).await?;
        }
        Ok(outcome)
    }

    /// Translates one event into exactly one append or one rejection.
    pub async fn resolve_event(&self, event: ScaleEvent) -> EngineResult<Option<CartLine>> {
        let req = match self.event_request(&event).await {
            Some(req) => req,
            None => {
                self.reject(
                    LineSource::Scale,
                    "Event carries no product, code, weight or price that can be sold".to_string(),
                );
                return Ok(None);
            }
        };
        self.append(req).await.map(Some)
    }

    async fn event_request(&self, event: &ScaleEvent) -> Option<LineRequest> {
        let list = self.price_list();

        let product = match event.product_id {
            Some(id) => self.catalog.get(id).await,
            None => None,
        };
        let product = match (product, event.code.as_deref()) {
            (Some(p), _) => Some(p),
            (None, Some(code)) => self.catalog.find_by_code(code).await,
            (None, None) => None,
        };
        let product = match (product, event.weight, self.default_bulk_product_id) {
            (Some(p), _, _) => Some(p),
            (None, Some(_), Some(default_id)) => self.catalog.get(default_id).await,
            _ => None,
        };

        if let Some(product) = product {
            let mut req = LineRequest::from_product(
                &product,
                list,
                event.weight.unwrap_or_else(Quantity::one),
                LineSource::Scale,
            );
            if event.weight.is_some() {
                req.mode = SaleMode::Bulk;
            }
            return Some(req);
        }

        match (event.name.as_deref(), event.unit_price) {
            (Some(name), Some(price)) => Some(LineRequest::ad_hoc(
                name,
                price,
                event.weight.unwrap_or_else(Quantity::one),
                LineSource::Scale,
            )),
            _ => None,
        }
    }

    /// Polls the event queue once.
    ///
    /// Transport errors are returned without a notice; the next tick tries
    /// again. A malformed event is consumed and rejected.
    pub async fn poll_events_once(&self) -> EngineResult<Option<CartLine>> {
        match self.backend.poll_event().await {
            Ok(Some(event)) => {
                debug!(?event, "Scale event received");
                self.resolve_event(event).await
            }
            Ok(None) => Ok(None),
            Err(EngineError::InvalidResponse(reason)) => {
                self.reject(LineSource::Scale, format!("Malformed event: {}", reason));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn append(&self, req: LineRequest) -> EngineResult<CartLine> {
        let source = req.source;
        match self.cart.append_line(req).await {
            Ok(line) => {
                info!(%source, name = %line.name, quantity = %line.quantity, "Line appended");
                self.emitter.emit(Notice::LineAppended {
                    source,
                    name: line.name.clone(),
                });
                Ok(line)
            }
            Err(e) => {
                self.reject(source, e.user_message());
                Err(e)
            }
        }
    }

    fn reject(&self, source: LineSource, reason: String) {
        warn!(%source, reason = %reason, "Input rejected");
        self.emitter.emit(Notice::InputRejected { source, reason });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
