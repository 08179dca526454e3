//! # Checkout Submitter
//!
//! Validates, submits, prints and resets.
//!
//! ## Submit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  busy? ──yes──► Err(Busy)                                               │
//! │    │ no                                                                 │
//! │    ▼                                                                    │
//! │  cart snapshot + form ──► prepare_transaction ──err──► Err(Checkout)    │
//! │                              (known ids from        no network call     │
//! │                               the mirror, now)                          │
//! │    │ ok                                                                 │
//! │    ▼                                                                    │
//! │  POST transaction ──err──► SubmissionFailed notice, Err(..)             │
//! │    │ ok                    cart and form untouched                      │
//! │    ▼                                                                    │
//! │  TransactionSubmitted notice                                            │
//! │  print pipeline (failure → PrintFailed notice, kept for retry)          │
//! │  drop the submitted lines, reset form (later lines stay)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use mostrador_core::{prepare_transaction, Transaction};

use crate::backend::Backend;
use crate::cart::CartHandle;
use crate::catalog::CatalogMirror;
use crate::config::IssuerSettings;
use crate::error::{EngineError, EngineResult};
use crate::form::CheckoutForm;
use crate::notice::{CheckoutEventEmitter, Notice};
use crate::print::{PrintFailure, PrintJob, PrintPipeline, PrintReceipt};
use crate::shortcuts::Shortcut;
use crate::wire::{RenderFlags, RenderRequest, SubmitResponse, TransactionPayload};

/// Result of a successful submission. Printing may still have failed.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub transaction: Transaction,
    pub response: SubmitResponse,
    pub print: Result<PrintReceipt, PrintFailure>,
}

/// Clears the busy flag when dropped, on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct CheckoutSubmitter {
    backend: Arc<dyn Backend>,
    catalog: CatalogMirror,
    cart: CartHandle,
    form: Arc<Mutex<CheckoutForm>>,
    printer: PrintPipeline,
    emitter: Arc<dyn CheckoutEventEmitter>,
    issuer: IssuerSettings,
    flags: RenderFlags,
    busy: AtomicBool,
}

impl CheckoutSubmitter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn Backend>,
        catalog: CatalogMirror,
        cart: CartHandle,
        form: Arc<Mutex<CheckoutForm>>,
        printer: PrintPipeline,
        emitter: Arc<dyn CheckoutEventEmitter>,
        issuer: IssuerSettings,
        flags: RenderFlags,
    ) -> Self {
        CheckoutSubmitter {
            backend,
            catalog,
            cart,
            form,
            printer,
            emitter,
            issuer,
            flags,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submits the current cart with the current form.
    ///
    /// Returns [`EngineError::Busy`] while another submission is running.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> EngineResult<SubmitOutcome> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(EngineError::Busy)?;

        let cart = self.cart.snapshot().await?;
        let known = self.catalog.known_ids().await;
        let transaction = {
            let form = self.form.lock().await;
            prepare_transaction(form.request(&cart), |id| known.contains(&id))
        };
        let transaction = match transaction {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "Checkout blocked");
                return Err(e.into());
            }
        };

        let payload = TransactionPayload::from(&transaction);
        let response = match self.backend.submit_transaction(&payload).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, local_id = %transaction.local_id, "Submission failed");
                self.emitter.emit(Notice::SubmissionFailed {
                    message: e.user_message(),
                });
                return Err(e);
            }
        };

        info!(
            id = response.id,
            local_id = %transaction.local_id,
            total = %transaction.final_total,
            subtype = %transaction.subtype,
            "Transaction submitted"
        );
        self.emitter.emit(Notice::TransactionSubmitted {
            id: response.id,
            message: response.message.clone(),
        });

        let job = PrintJob::new(RenderRequest::new(
            &self.issuer,
            &cart.client,
            response.id,
            &transaction,
            self.flags,
        ));
        let print = self.printer.run(job).await;
        if let Err(failure) = &print {
            self.emitter.emit(Notice::PrintFailed {
                message: failure.to_string(),
            });
        }

        let left = self.cart.clear_submitted(&cart).await?;
        if left > 0 {
            info!(left, "Lines added during submission kept for the next sale");
        }
        self.form.lock().await.reset();

        Ok(SubmitOutcome {
            transaction,
            response,
            print,
        })
    }

    /// Presets the form from `shortcut` and submits.
    pub async fn apply_shortcut(&self, shortcut: Shortcut) -> EngineResult<SubmitOutcome> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        let (kind, method) = shortcut.preset();
        let totals = self.cart.snapshot().await?.totals();
        self.form
            .lock()
            .await
            .apply_preset(kind, method, &totals)?;

        info!(%shortcut, "Shortcut applied");
        self.submit().await
    }

    /// Re-runs a failed print job.
    pub async fn retry_print(&self, failure: PrintFailure) -> Result<PrintReceipt, PrintFailure> {
        let result = self.printer.retry(failure).await;
        if let Err(failure) = &result {
            self.emitter.emit(Notice::PrintFailed {
                message: failure.to_string(),
            });
        }
        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartActor;
    use crate::fake::{product, FakeBackend};
    use crate::notice::NoOpEmitter;
    use crate::print::DisabledPrinter;
    use crate::print::DocumentSink;
    use async_trait::async_trait;
    use mostrador_core::{
        CoreError, DocumentKind, LineRequest, LineSource, Money, PaymentMethod, PriceList,
        Quantity, SurchargeSettings,
    };
    use std::path::PathBuf;

    struct NullSink;

    #[async_trait]
    impl DocumentSink for NullSink {
        async fn save(&self, name: &str, _bytes: &[u8]) -> EngineResult<PathBuf> {
            Ok(PathBuf::from(name))
        }
    }

    async fn submitter(backend: Arc<FakeBackend>) -> (CheckoutSubmitter, CartHandle, Arc<Mutex<CheckoutForm>>) {
        let emitter: Arc<dyn CheckoutEventEmitter> = Arc::new(NoOpEmitter);
        let catalog = CatalogMirror::new(backend.clone(), emitter.clone());
        catalog.refresh_all().await.unwrap();
        let (actor, cart) = CartActor::new();
        tokio::spawn(actor.run());
        let form = Arc::new(Mutex::new(CheckoutForm::new(SurchargeSettings::default())));
        let printer = PrintPipeline::new(backend.clone(), Arc::new(NullSink), Arc::new(DisabledPrinter));

        let submitter = CheckoutSubmitter::new(
            backend,
            catalog,
            cart.clone(),
            form.clone(),
            printer,
            emitter,
            IssuerSettings::default(),
            RenderFlags {
                mostrar_leyenda_legal: true,
                mostrar_desglose_iva: true,
            },
        );
        (submitter, cart, form)
    }

    async fn add(cart: &CartHandle, qty: i64) {
        cart.append_line(LineRequest::from_product(
            &product(1, "Yerba", 100),
            PriceList::Retail,
            Quantity::from_units(qty),
            LineSource::Manual,
        ))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_shortcut_submits_and_resets() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        let (submitter, cart, form) = submitter(backend.clone()).await;
        add(&cart, 3).await;

        let outcome = submitter.apply_shortcut(Shortcut::F1).await.unwrap();
        assert_eq!(outcome.transaction.final_total, Money::from_units(300));
        assert_eq!(outcome.transaction.payment.change, Money::zero());
        assert!(outcome.print.is_ok());

        assert!(cart.snapshot().await.unwrap().is_empty());
        let form = form.lock().await;
        assert!(!form.panel_acknowledged);
        assert_eq!(form.kind, DocumentKind::Comprobante);
        assert!(!submitter.is_busy());
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_backend() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        let (submitter, cart, _form) = submitter(backend.clone()).await;
        add(&cart, 1).await;

        let err = submitter.submit().await.unwrap_err();
        assert!(matches!(err, EngineError::Checkout(CoreError::PaymentPanelClosed)));
        assert!(backend.submitted.lock().unwrap().is_empty());
        assert!(!submitter.is_busy());
    }

    #[tokio::test]
    async fn test_server_rejection_keeps_cart() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        *backend.reject_submit.lock().unwrap() = Some("Caja cerrada".into());
        let (submitter, cart, form) = submitter(backend.clone()).await;
        add(&cart, 2).await;

        {
            let mut form = form.lock().await;
            form.open_payment_panel();
            form.payment.select_single(PaymentMethod::Transfer);
        }
        let err = submitter.submit().await.unwrap_err();
        assert_eq!(err.user_message(), "Caja cerrada");
        assert_eq!(cart.snapshot().await.unwrap().line_count(), 2);
        assert!(form.lock().await.panel_acknowledged);
    }

    #[tokio::test]
    async fn test_busy_flag_rejects_reentry() {
        let backend = Arc::new(FakeBackend::default());
        let (submitter, _cart, _form) = submitter(backend).await;

        let guard = BusyGuard::acquire(&submitter.busy).unwrap();
        assert!(matches!(submitter.submit().await, Err(EngineError::Busy)));
        assert!(matches!(
            submitter.apply_shortcut(Shortcut::F2).await,
            Err(EngineError::Busy)
        ));
        drop(guard);
        assert!(!submitter.is_busy());
    }
}
