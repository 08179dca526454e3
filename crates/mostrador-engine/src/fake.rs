//! In-memory [`Backend`] for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use mostrador_core::{Money, Product};

use crate::backend::Backend;
use crate::error::{EngineError, EngineResult};
use crate::wire::{RenderRequest, ScaleEvent, SubmitResponse, TransactionPayload};

pub(crate) fn product(id: i64, name: &str, price_units: i64) -> Product {
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

pub(crate) fn bulk_product(id: i64, name: &str, price_units: i64) -> Product {
    Product {
        unit_of_sale: "kg".to_string(),
        ..product(id, name, price_units)
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub products: Mutex<Vec<Product>>,
    /// Only reachable through the code lookup endpoint.
    pub by_code: Mutex<Vec<Product>>,
    pub events: Mutex<VecDeque<ScaleEvent>>,
    pub version: AtomicI64,
    pub fetch_calls: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub submitted: Mutex<Vec<TransactionPayload>>,
    /// Server message returned with a 422 on submit.
    pub reject_submit: Mutex<Option<String>>,
    pub fail_render: AtomicBool,
    pub rendered: Mutex<Vec<RenderRequest>>,
}

impl FakeBackend {
    pub fn with_products(products: Vec<Product>) -> Self {
        FakeBackend {
            products: Mutex::new(products),
            ..Default::default()
        }
    }

    pub fn set_products(&self, products: Vec<Product>) {
        *self.products.lock().unwrap() = products;
    }

    pub fn push_event(&self, event: ScaleEvent) {
        self.events.lock().unwrap().push_back(event);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_products(&self) -> EngineResult<Vec<Product>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(EngineError::Network("connection refused".into()));
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn catalog_version(&self) -> EngineResult<i64> {
        Ok(self.version.load(Ordering::SeqCst))
    }

    async fn product_by_code(&self, code: &str) -> EngineResult<Option<Product>> {
        let by_code = self.by_code.lock().unwrap();
        let products = self.products.lock().unwrap();
        Ok(by_code
            .iter()
            .chain(products.iter())
            .find(|p| p.matches_code(code))
            .cloned())
    }

    async fn poll_event(&self) -> EngineResult<Option<ScaleEvent>> {
        Ok(self.events.lock().unwrap().pop_front())
    }

    async fn submit_transaction(&self, payload: &TransactionPayload) -> EngineResult<SubmitResponse> {
        if let Some(message) = self.reject_submit.lock().unwrap().clone() {
            return Err(EngineError::ServerRejected {
                status: 422,
                message,
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(payload.clone());
        Ok(SubmitResponse {
            id: 1000 + submitted.len() as i64,
            message: "Venta registrada".to_string(),
        })
    }

    async fn render_document(&self, request: &RenderRequest) -> EngineResult<Vec<u8>> {
        self.rendered.lock().unwrap().push(request.clone());
        if self.fail_render.load(Ordering::SeqCst) {
            return Err(EngineError::ServerRejected {
                status: 500,
                message: "render failed".into(),
            });
        }
        Ok(b"%PDF-1.4 fake".to_vec())
    }
}
