//! # Wire Shapes
//!
//! JSON bodies exchanged with the backend, and their conversion into the
//! domain types of `mostrador-core`.
//!
//! ```text
//! ┌──────────────────┐  TryFrom   ┌──────────────┐
//! │ ProductRecord    │ ─────────► │ Product      │   floats checked here,
//! │ ScaleEventRecord │ ─────────► │ ScaleEvent   │   never past this module
//! └──────────────────┘            └──────────────┘
//!
//! ┌──────────────┐   From   ┌──────────────────────┐
//! │ Transaction  │ ───────► │ TransactionPayload   │
//! └──────────────┘          └──────────────────────┘
//! ```
//!
//! The backend speaks Spanish field names and decimal numbers. Everything
//! is converted to cents / milli-units on the way in, and back to decimals
//! on the way out.

use serde::{Deserialize, Serialize};

use mostrador_core::{
    ClientContext, DocumentSubtype, Money, PaymentEntry, PaymentMethod, Product, Quantity,
    Transaction, TransactionLine,
};

use crate::config::{IssuerSettings, PrintSettings};
use crate::error::{EngineError, EngineResult};

/// VAT applied when the catalog does not say otherwise (21%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 2_100;

// =============================================================================
// Number Conversion
// =============================================================================

/// Decimal amount → cents. Rejects NaN, infinities and negatives.
pub fn money_from_f64(field: &str, value: f64) -> EngineResult<Money> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidResponse(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(Money::from_cents((value * 100.0).round() as i64))
}

/// Decimal quantity → milli-units. Same checks as [`money_from_f64`].
pub fn quantity_from_f64(field: &str, value: f64) -> EngineResult<Quantity> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidResponse(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(Quantity::from_milli((value * 1000.0).round() as i64))
}

#[inline]
pub fn money_to_f64(money: Money) -> f64 {
    money.cents() as f64 / 100.0
}

#[inline]
fn bps_to_f64(bps: u32) -> f64 {
    bps as f64 / 100.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// =============================================================================
// Catalog
// =============================================================================

/// One product as returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub codigo: Option<String>,
    pub precio_venta: f64,
    #[serde(default)]
    pub precio_mayorista: Option<f64>,
    #[serde(default)]
    pub stock: Option<f64>,
    #[serde(default)]
    pub unidad_medida: Option<String>,
    /// VAT percentage (21.0, 10.5, ...).
    #[serde(default)]
    pub tasa_iva: Option<f64>,
    #[serde(default = "default_active")]
    pub activo: bool,
}

fn default_active() -> bool {
    true
}

impl TryFrom<ProductRecord> for Product {
    type Error = EngineError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        if record.id <= 0 {
            return Err(EngineError::InvalidResponse(format!(
                "product id must be positive, got {}",
                record.id
            )));
        }

        let retail_price = money_from_f64("precio_venta", record.precio_venta)?;
        let wholesale_price = match record.precio_mayorista {
            Some(p) => money_from_f64("precio_mayorista", p)?,
            None => retail_price,
        };
        let stock = record
            .stock
            .map(|s| quantity_from_f64("stock", s))
            .transpose()?;
        let tax_rate_bps = match record.tasa_iva {
            Some(rate) if rate.is_finite() && rate >= 0.0 => (rate * 100.0).round() as u32,
            Some(rate) => {
                return Err(EngineError::InvalidResponse(format!(
                    "tasa_iva must be a non-negative number, got {}",
                    rate
                )))
            }
            None => DEFAULT_TAX_RATE_BPS,
        };

        Ok(Product {
            id: record.id,
            name: record.nombre.trim().to_string(),
            code: non_blank(record.codigo),
            retail_price,
            wholesale_price,
            stock,
            unit_of_sale: record.unidad_medida.unwrap_or_default(),
            tax_rate_bps,
            active: record.activo,
        })
    }
}

/// Catalog version counter. Accepts `{"version": n}` or a bare integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VersionResponse {
    Wrapped { version: i64 },
    Plain(i64),
}

impl VersionResponse {
    pub fn version(&self) -> i64 {
        match self {
            VersionResponse::Wrapped { version } | VersionResponse::Plain(version) => *version,
        }
    }
}

// =============================================================================
// Scale / Scanner Events
// =============================================================================

/// Raw event from the event queue. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleEventRecord {
    #[serde(default)]
    pub id_articulo: Option<i64>,
    #[serde(default)]
    pub codigo: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub precio: Option<f64>,
    /// Weight in the product's bulk unit (kg, l).
    #[serde(default)]
    pub peso: Option<f64>,
}

/// Body of the event poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPollResponse {
    pub has_event: bool,
    #[serde(default)]
    pub event: Option<ScaleEventRecord>,
}

impl EventPollResponse {
    /// `None` when the queue was empty.
    pub fn into_event(self) -> EngineResult<Option<ScaleEvent>> {
        match (self.has_event, self.event) {
            (false, _) => Ok(None),
            (true, Some(record)) => ScaleEvent::try_from(record).map(Some),
            (true, None) => Err(EngineError::InvalidResponse(
                "has_event is true but no event was sent".into(),
            )),
        }
    }
}

/// A validated scale/scanner event. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleEvent {
    pub product_id: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit_price: Option<Money>,
    pub weight: Option<Quantity>,
}

impl TryFrom<ScaleEventRecord> for ScaleEvent {
    type Error = EngineError;

    fn try_from(record: ScaleEventRecord) -> Result<Self, Self::Error> {
        let weight = record
            .peso
            .map(|w| quantity_from_f64("peso", w))
            .transpose()?
            .filter(|w| w.is_positive());

        Ok(ScaleEvent {
            product_id: record.id_articulo.filter(|id| *id > 0),
            code: non_blank(record.codigo),
            name: non_blank(record.nombre),
            unit_price: record
                .precio
                .map(|p| money_from_f64("precio", p))
                .transpose()?,
            weight,
        })
    }
}

// =============================================================================
// Transaction Submission
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticlePayload {
    pub id_articulo: i64,
    pub nombre: String,
    pub cantidad: f64,
    pub precio_unitario: f64,
    pub subtotal: f64,
    pub tasa_iva: f64,
}

impl From<&TransactionLine> for ArticlePayload {
    fn from(line: &TransactionLine) -> Self {
        ArticlePayload {
            id_articulo: line.product_id,
            nombre: line.name.clone(),
            cantidad: line.quantity.as_f64(),
            precio_unitario: money_to_f64(line.unit_price),
            subtotal: money_to_f64(line.subtotal),
            tasa_iva: bps_to_f64(line.tax_rate_bps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentPayload {
    pub metodo: PaymentMethod,
    pub monto: f64,
}

impl From<&PaymentEntry> for PaymentPayload {
    fn from(entry: &PaymentEntry) -> Self {
        PaymentPayload {
            metodo: entry.method,
            monto: money_to_f64(entry.amount),
        }
    }
}

/// Body of the transaction submission.
///
/// Exactly one of `metodo_pago` / `pagos_multiples` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPayload {
    pub id_cliente: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuit_cliente: Option<String>,
    /// Net total (after discounts, before surcharge).
    pub total_venta: f64,
    pub descuento_total: f64,
    pub recargo: f64,
    pub total_final: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metodo_pago: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto_pagado: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagos_multiples: Option<Vec<PaymentPayload>>,
    pub tipo_comprobante_solicitado: DocumentSubtype,
    pub quiere_factura: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
    pub articulos_vendidos: Vec<ArticlePayload>,
}

impl From<&Transaction> for TransactionPayload {
    fn from(tx: &Transaction) -> Self {
        let (metodo_pago, monto_pagado, pagos_multiples) = match tx.payment.single_method() {
            Some(method) => {
                let paid = tx.final_total + tx.payment.change;
                (Some(method), Some(money_to_f64(paid)), None)
            }
            None => (
                None,
                None,
                Some(tx.payment.entries.iter().map(PaymentPayload::from).collect()),
            ),
        };

        TransactionPayload {
            id_cliente: tx.client_id,
            cuit_cliente: tx.tax_id.clone(),
            total_venta: money_to_f64(tx.net_total),
            descuento_total: money_to_f64(tx.discount_total),
            recargo: money_to_f64(tx.surcharge),
            total_final: money_to_f64(tx.final_total),
            metodo_pago,
            monto_pagado,
            pagos_multiples,
            tipo_comprobante_solicitado: tx.subtype,
            quiere_factura: tx.wants_invoice(),
            observaciones: tx.observations.clone(),
            articulos_vendidos: tx.lines.iter().map(ArticlePayload::from).collect(),
        }
    }
}

/// Success body of the submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "id_venta")]
    pub id: i64,
    #[serde(default, alias = "mensaje")]
    pub message: String,
}

/// Error body. `detail` is a string, or a list of validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Human-readable text taken from `detail`.
    pub fn message(&self) -> Option<String> {
        detail_text(&self.detail)
    }
}

fn detail_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(detail_text).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(map) => map
            .get("msg")
            .or_else(|| map.get("message"))
            .or_else(|| map.get("detail"))
            .and_then(detail_text),
        _ => None,
    }
}

// =============================================================================
// Document Rendering
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuerPayload {
    pub nombre: String,
    pub cuit: Option<String>,
    pub domicilio: Option<String>,
    pub condicion_iva: Option<String>,
}

impl From<&IssuerSettings> for IssuerPayload {
    fn from(issuer: &IssuerSettings) -> Self {
        IssuerPayload {
            nombre: issuer.name.clone(),
            cuit: issuer.tax_id.clone(),
            domicilio: issuer.address.clone(),
            condicion_iva: issuer.tax_condition.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverPayload {
    pub nombre: String,
    pub cuit: Option<String>,
}

impl ReceiverPayload {
    pub fn from_client(client: &ClientContext, tax_id: Option<&str>) -> Self {
        let nombre = match client {
            ClientContext::Registered {
                client: Some(client),
            } => client.name.clone(),
            _ => "Consumidor Final".to_string(),
        };
        ReceiverPayload {
            nombre,
            cuit: tax_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTransaction {
    pub id: i64,
    pub fecha: String,
    pub tipo_comprobante: DocumentSubtype,
    #[serde(flatten)]
    pub venta: TransactionPayload,
}

/// Legal boilerplate toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderFlags {
    pub mostrar_leyenda_legal: bool,
    pub mostrar_desglose_iva: bool,
}

impl From<&PrintSettings> for RenderFlags {
    fn from(print: &PrintSettings) -> Self {
        RenderFlags {
            mostrar_leyenda_legal: print.show_legal_footer,
            mostrar_desglose_iva: print.show_tax_breakdown,
        }
    }
}

/// Body of the document render endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub emisor: IssuerPayload,
    pub receptor: ReceiverPayload,
    pub transaccion: RenderedTransaction,
    pub opciones: RenderFlags,
}

impl RenderRequest {
    pub fn new(
        issuer: &IssuerSettings,
        client: &ClientContext,
        backend_id: i64,
        tx: &Transaction,
        flags: RenderFlags,
    ) -> Self {
        RenderRequest {
            emisor: IssuerPayload::from(issuer),
            receptor: ReceiverPayload::from_client(client, tx.tax_id.as_deref()),
            transaccion: RenderedTransaction {
                id: backend_id,
                fecha: tx.created_at.to_rfc3339(),
                tipo_comprobante: tx.subtype,
                venta: TransactionPayload::from(tx),
            },
            opciones: flags,
        }
    }

    /// File name for the saved document (`factura_b_00001234.pdf`).
    pub fn file_name(&self) -> String {
        format!(
            "{}_{:08}.pdf",
            self.transaccion.tipo_comprobante.as_str(),
            self.transaccion.id
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ProductRecord {
        serde_json::from_value(json!({
            "id": 7,
            "nombre": " Queso Cremoso ",
            "codigo": "779001",
            "precio_venta": 1234.5,
            "precio_mayorista": 1000.0,
            "stock": 12.25,
            "unidad_medida": "kg",
            "tasa_iva": 10.5
        }))
        .unwrap()
    }

    #[test]
    fn test_product_record_conversion() {
        let product = Product::try_from(record()).unwrap();
        assert_eq!(product.name, "Queso Cremoso");
        assert_eq!(product.retail_price, Money::from_cents(123_450));
        assert_eq!(product.wholesale_price, Money::from_units(1000));
        assert_eq!(product.stock, Some(Quantity::from_milli(12_250)));
        assert_eq!(product.tax_rate_bps, 1050);
        assert!(product.active);
    }

    #[test]
    fn test_product_record_rejects_bad_numbers() {
        let mut bad = record();
        bad.precio_venta = -1.0;
        assert!(matches!(
            Product::try_from(bad),
            Err(EngineError::InvalidResponse(_))
        ));

        let mut bad = record();
        bad.id = 0;
        assert!(Product::try_from(bad).is_err());
    }

    #[test]
    fn test_wholesale_defaults_to_retail() {
        let mut r = record();
        r.precio_mayorista = None;
        r.tasa_iva = None;
        let product = Product::try_from(r).unwrap();
        assert_eq!(product.wholesale_price, product.retail_price);
        assert_eq!(product.tax_rate_bps, DEFAULT_TAX_RATE_BPS);
    }

    #[test]
    fn test_event_poll_parsing() {
        let empty: EventPollResponse = serde_json::from_value(json!({"has_event": false})).unwrap();
        assert_eq!(empty.into_event().unwrap(), None);

        let weighed: EventPollResponse =
            serde_json::from_value(json!({"has_event": true, "event": {"peso": 0.25}})).unwrap();
        let event = weighed.into_event().unwrap().unwrap();
        assert_eq!(event.weight, Some(Quantity::from_milli(250)));
        assert_eq!(event.product_id, None);

        let broken: EventPollResponse = serde_json::from_value(json!({"has_event": true})).unwrap();
        assert!(broken.into_event().is_err());
    }

    #[test]
    fn test_version_shapes() {
        let wrapped: VersionResponse = serde_json::from_value(json!({"version": 4})).unwrap();
        let plain: VersionResponse = serde_json::from_value(json!(9)).unwrap();
        assert_eq!(wrapped.version(), 4);
        assert_eq!(plain.version(), 9);
    }

    #[test]
    fn test_error_detail_text() {
        let body: ErrorBody = serde_json::from_value(json!({"detail": "Stock insuficiente"})).unwrap();
        assert_eq!(body.message().as_deref(), Some("Stock insuficiente"));

        let body: ErrorBody = serde_json::from_value(json!({
            "detail": [{"loc": ["body", "total_venta"], "msg": "field required"}]
        }))
        .unwrap();
        assert_eq!(body.message().as_deref(), Some("field required"));
    }
}
