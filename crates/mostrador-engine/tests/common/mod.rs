//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mostrador_core::{Money, Product};
use mostrador_engine::backend::Backend;
use mostrador_engine::print::{DisabledPrinter, DocumentSink};
use mostrador_engine::wire::{
    EventPollResponse, RenderRequest, ScaleEvent, SubmitResponse, TransactionPayload,
};
use mostrador_engine::{
    ChannelEmitter, CheckoutSession, EngineConfig, EngineError, EngineResult, Notice,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn product(id: i64, name: &str, price_units: i64) -> Product {
    Product {
        id,
        name: name.to_string(),
        code: None,
        retail_price: Money::from_units(price_units),
        wholesale_price: Money::from_units(price_units),
        stock: None,
        unit_of_sale: "unidad".to_string(),
        tax_rate_bps: 2100,
        active: true,
    }
}

pub fn bulk_product(id: i64, name: &str, price_units: i64) -> Product {
    Product {
        unit_of_sale: "kg".to_string(),
        ..product(id, name, price_units)
    }
}

/// Backend double recording every call.
#[derive(Default)]
pub struct StubBackend {
    pub products: Mutex<Vec<Product>>,
    pub events: Mutex<VecDeque<ScaleEvent>>,
    pub version: AtomicI64,
    pub fetch_calls: AtomicUsize,
    pub version_calls: AtomicUsize,
    pub submitted: Mutex<Vec<TransactionPayload>>,
    pub rejection: Mutex<Option<String>>,
    /// How long `submit_transaction` takes before answering.
    pub submit_delay: Mutex<Option<Duration>>,
    pub rendered: Mutex<Vec<RenderRequest>>,
}

impl StubBackend {
    pub fn with_products(products: Vec<Product>) -> Arc<Self> {
        Arc::new(StubBackend {
            products: Mutex::new(products),
            ..Default::default()
        })
    }

    pub fn push_event(&self, event: ScaleEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    /// Replaces the backend catalog and bumps its version.
    pub fn publish(&self, products: Vec<Product>) {
        *self.products.lock().unwrap() = products;
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn fetch_products(&self) -> EngineResult<Vec<Product>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.lock().unwrap().clone())
    }

    async fn catalog_version(&self) -> EngineResult<i64> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.version.load(Ordering::SeqCst))
    }

    async fn product_by_code(&self, code: &str) -> EngineResult<Option<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.matches_code(code))
            .cloned())
    }

    async fn poll_event(&self) -> EngineResult<Option<ScaleEvent>> {
        Ok(self.events.lock().unwrap().pop_front())
    }

    async fn submit_transaction(&self, payload: &TransactionPayload) -> EngineResult<SubmitResponse> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.rejection.lock().unwrap().clone() {
            return Err(EngineError::ServerRejected {
                status: 400,
                message,
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(payload.clone());
        Ok(SubmitResponse {
            id: submitted.len() as i64,
            message: "Venta registrada".to_string(),
        })
    }

    async fn render_document(&self, request: &RenderRequest) -> EngineResult<Vec<u8>> {
        self.rendered.lock().unwrap().push(request.clone());
        Ok(b"%PDF-1.4".to_vec())
    }
}

/// Keeps saved documents in memory.
#[derive(Default)]
pub struct MemorySink {
    pub saved: Mutex<Vec<String>>,
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn save(&self, name: &str, _bytes: &[u8]) -> EngineResult<PathBuf> {
        self.saved.lock().unwrap().push(name.to_string());
        Ok(PathBuf::from(name))
    }
}

/// Config whose heartbeat and purge never fire during a test.
pub fn quiet_config(default_bulk_product: Option<i64>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.timers.heartbeat_secs = 3_600;
    config.timers.purge_secs = 7_200;
    config.checkout.default_bulk_product_id = default_bulk_product;
    config
}

pub async fn mount(
    config: &EngineConfig,
    backend: Arc<StubBackend>,
) -> (CheckoutSession, UnboundedReceiver<Notice>) {
    let (emitter, rx) = ChannelEmitter::new();
    let session = CheckoutSession::mount_with(
        config,
        backend,
        Arc::new(emitter),
        Arc::new(MemorySink::default()),
        Arc::new(DisabledPrinter),
    )
    .await;
    (session, rx)
}

/// A scale event as the backend queue returns it.
pub fn weighed(json: &str) -> ScaleEvent {
    let poll: EventPollResponse = serde_json::from_str(json).unwrap();
    poll.into_event().unwrap().unwrap()
}

pub fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
