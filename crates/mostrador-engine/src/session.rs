//! # Checkout Session
//!
//! The lifetime of one checkout screen. Mounting builds every component
//! and starts the background tasks; dropping or shutting down the session
//! stops all of them.
//!
//! ## Tasks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CheckoutSession (mounted)                         │
//! │                                                                         │
//! │  cart actor ........... until shutdown                                  │
//! │  heartbeat ............ every 10s   catalog.refresh_all()               │
//! │  version poll ......... every 5s    catalog.check_version()             │
//! │  hard purge ........... every 300s  catalog.purge_and_reload()          │
//! │  event poll ........... every 1s    input.poll_events_once()            │
//! │                                                                         │
//! │  shutdown(): signal ─► await each task                                  │
//! │  Drop:       abort whatever is still running                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cart::{CartActor, CartHandle};
use crate::catalog::CatalogMirror;
use crate::checkout::CheckoutSubmitter;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::form::CheckoutForm;
use crate::input::InputReconciler;
use crate::notice::CheckoutEventEmitter;
use crate::print::{printer_from_settings, DocumentPrinter, DocumentSink, FileSink, PrintPipeline};
use crate::wire::RenderFlags;

// =============================================================================
// Task Set
// =============================================================================

/// Background tasks sharing one shutdown signal.
struct TaskSet {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskSet {
    fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        TaskSet {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Runs `task` until it finishes or the shutdown signal fires.
    fn spawn_until_shutdown<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.spawn(name, async move {
            tokio::select! {
                _ = task => {}
                _ = shutdown_rx.changed() => {}
            }
        });
    }

    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "Spawning session task");
        self.handles.push((name, tokio::spawn(task)));
    }

    /// Runs `tick` every `period`, first after one full period.
    fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.spawn(name, async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!(task = name, "Session task stopped");
        });
    }

    async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.handles.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(task = name, error = %e, "Session task panicked");
                }
            }
        }
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct CheckoutSession {
    catalog: CatalogMirror,
    cart: CartHandle,
    form: Arc<Mutex<CheckoutForm>>,
    input: InputReconciler,
    submitter: Arc<CheckoutSubmitter>,
    tasks: TaskSet,
}

impl CheckoutSession {
    /// Mounts a session with the sink and printer described by `config`.
    pub async fn mount(
        config: &EngineConfig,
        backend: Arc<dyn Backend>,
        emitter: Arc<dyn CheckoutEventEmitter>,
    ) -> EngineResult<Self> {
        let sink = Arc::new(FileSink::new(config.print.output_dir()));
        let printer = printer_from_settings(&config.print)?;
        Ok(Self::mount_with(config, backend, emitter, sink, printer).await)
    }

    /// Mounts a session with explicit document sink and printer.
    pub async fn mount_with(
        config: &EngineConfig,
        backend: Arc<dyn Backend>,
        emitter: Arc<dyn CheckoutEventEmitter>,
        sink: Arc<dyn DocumentSink>,
        printer: Arc<dyn DocumentPrinter>,
    ) -> Self {
        info!(
            backend = %config.backend.base_url,
            default_bulk_product = ?config.checkout.default_bulk_product_id,
            "Mounting checkout session"
        );

        let catalog = CatalogMirror::new(backend.clone(), emitter.clone());
        if let Err(e) = catalog.reload().await {
            warn!(error = %e, "Initial catalog load failed, starting with an empty mirror");
        }

        let mut tasks = TaskSet::new();

        let (actor, cart) = CartActor::new();
        tasks.spawn_until_shutdown("cart", actor.run());

        let form = Arc::new(Mutex::new(CheckoutForm::new(config.checkout.surcharges())));
        let input = InputReconciler::new(
            cart.clone(),
            catalog.clone(),
            backend.clone(),
            emitter.clone(),
            config.checkout.default_bulk_product_id,
        );
        let submitter = Arc::new(CheckoutSubmitter::new(
            backend.clone(),
            catalog.clone(),
            cart.clone(),
            form.clone(),
            PrintPipeline::new(backend, sink, printer),
            emitter,
            config.issuer.clone(),
            RenderFlags::from(&config.print),
        ));

        let timers = &config.timers;

        let mirror = catalog.clone();
        tasks.spawn_periodic("heartbeat", timers.heartbeat(), move || {
            let mirror = mirror.clone();
            async move {
                let _ = mirror.refresh_all().await;
            }
        });

        let mirror = catalog.clone();
        tasks.spawn_periodic("version-poll", timers.version_poll(), move || {
            let mirror = mirror.clone();
            async move {
                let _ = mirror.check_version().await;
            }
        });

        let mirror = catalog.clone();
        tasks.spawn_periodic("hard-purge", timers.purge(), move || {
            let mirror = mirror.clone();
            async move {
                let _ = mirror.purge_and_reload().await;
            }
        });

        let poller = input.clone();
        tasks.spawn_periodic("event-poll", timers.event_poll(), move || {
            let poller = poller.clone();
            async move {
                if let Err(e) = poller.poll_events_once().await {
                    debug!(error = %e, "Event poll failed");
                }
            }
        });

        CheckoutSession {
            catalog,
            cart,
            form,
            input,
            submitter,
            tasks,
        }
    }

    pub fn catalog(&self) -> &CatalogMirror {
        &self.catalog
    }

    pub fn cart(&self) -> &CartHandle {
        &self.cart
    }

    pub fn form(&self) -> &Arc<Mutex<CheckoutForm>> {
        &self.form
    }

    pub fn input(&self) -> &InputReconciler {
        &self.input
    }

    pub fn submitter(&self) -> &Arc<CheckoutSubmitter> {
        &self.submitter
    }

    /// Stops every background task and waits for them to finish.
    ///
    /// A tick already running completes first.
    pub async fn shutdown(mut self) {
        info!("Unmounting checkout session");
        self.tasks.shutdown().await;
    }
}
