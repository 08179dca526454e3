//! # Backend Client
//!
//! The REST backend behind the checkout, as a trait so the engine can run
//! against an in-memory fake.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET  /articulos/                  full product list                    │
//! │  GET  /articulos/version           catalog version counter              │
//! │  GET  /articulos/codigo/{code}     product by scan code (404 = none)   │
//! │  GET  /eventos/balanza/siguiente   at most one unconsumed event         │
//! │  POST /ventas/                     transaction submission               │
//! │  POST /comprobantes/render         rendered document (binary)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-success responses become [`EngineError::ServerRejected`] carrying the
//! server's own `detail` text, except 404 which is [`EngineError::NotFound`].

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use mostrador_core::Product;

use crate::error::{EngineError, EngineResult};
use crate::wire::{
    ErrorBody, EventPollResponse, ProductRecord, RenderRequest, ScaleEvent, SubmitResponse,
    TransactionPayload, VersionResponse,
};

const PRODUCTS_PATH: &[&str] = &["articulos", ""];
const VERSION_PATH: &[&str] = &["articulos", "version"];
const BY_CODE_PATH: &[&str] = &["articulos", "codigo"];
const EVENTS_PATH: &[&str] = &["eventos", "balanza", "siguiente"];
const SALES_PATH: &[&str] = &["ventas", ""];
const RENDER_PATH: &[&str] = &["comprobantes", "render"];

// =============================================================================
// Backend Trait
// =============================================================================

#[async_trait]
pub trait Backend: Send + Sync {
    /// Every product the backend knows, active or not.
    async fn fetch_products(&self) -> EngineResult<Vec<Product>>;

    async fn catalog_version(&self) -> EngineResult<i64>;

    /// `Ok(None)` when no product carries the code.
    async fn product_by_code(&self, code: &str) -> EngineResult<Option<Product>>;

    /// Pops the next scale/scanner event, if any.
    async fn poll_event(&self) -> EngineResult<Option<ScaleEvent>>;

    async fn submit_transaction(&self, payload: &TransactionPayload) -> EngineResult<SubmitResponse>;

    /// Rendered document bytes (PDF).
    async fn render_document(&self, request: &RenderRequest) -> EngineResult<Vec<u8>>;
}

// =============================================================================
// HTTP Backend
// =============================================================================

/// [`Backend`] over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> EngineResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().build()?;
        Ok(HttpBackend { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> EngineResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> EngineResult<T> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Maps non-success responses to errors, passing successful ones through.
async fn check_status(response: Response) -> EngineResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    if status == StatusCode::NOT_FOUND {
        return Err(EngineError::NotFound(message));
    }
    Err(EngineError::ServerRejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_products(&self) -> EngineResult<Vec<Product>> {
        let records: Vec<serde_json::Value> = self.get_json(self.endpoint(PRODUCTS_PATH)?).await?;
        let total = records.len();

        let products: Vec<Product> = records
            .into_iter()
            .filter_map(|raw| {
                let parsed = serde_json::from_value::<ProductRecord>(raw)
                    .map_err(EngineError::from)
                    .and_then(Product::try_from);
                match parsed {
                    Ok(product) => Some(product),
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed product record");
                        None
                    }
                }
            })
            .collect();

        debug!(total, parsed = products.len(), "Fetched catalog");
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn catalog_version(&self) -> EngineResult<i64> {
        let body: VersionResponse = self.get_json(self.endpoint(VERSION_PATH)?).await?;
        Ok(body.version())
    }

    #[instrument(skip(self))]
    async fn product_by_code(&self, code: &str) -> EngineResult<Option<Product>> {
        let mut url = self.endpoint(BY_CODE_PATH)?;
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidUrl(self.base_url.to_string()))?
            .push(code);

        match self.get_json::<ProductRecord>(url).await {
            Ok(record) => Ok(Some(Product::try_from(record)?)),
            Err(EngineError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn poll_event(&self) -> EngineResult<Option<ScaleEvent>> {
        let body: EventPollResponse = self.get_json(self.endpoint(EVENTS_PATH)?).await?;
        body.into_event()
    }

    #[instrument(skip(self, payload), fields(lines = payload.articulos_vendidos.len()))]
    async fn submit_transaction(&self, payload: &TransactionPayload) -> EngineResult<SubmitResponse> {
        let response = self
            .client
            .post(self.endpoint(SALES_PATH)?)
            .json(payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, request), fields(id = request.transaccion.id))]
    async fn render_document(&self, request: &RenderRequest) -> EngineResult<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint(RENDER_PATH)?)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
