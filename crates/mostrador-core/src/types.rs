//! # Domain Types
//!
//! Core domain types used throughout Mostrador.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  ClientContext  │   │  PaymentMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (> 0)       │   │  FinalConsumer  │   │  Cash           │       │
//! │  │  retail_price   │   │   + tax id?     │   │  Transfer       │       │
//! │  │  wholesale_price│   │  Registered     │   │  BankPos        │       │
//! │  │  stock          │   │   + client?     │   │  CurrentAccount │       │
//! │  │  unit_of_sale   │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Percent      │   │  DocumentKind   │   │ DocumentSubtype │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Factura        │   │  FacturaA/B     │       │
//! │  │  1000 = 10%     │   │  Comprobante    │   │  Recibo         │       │
//! │  └─────────────────┘   │  Remito, ...    │   │  Remito, ...    │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing::classify_unit_of_sale;
use crate::quantity::Quantity;

// =============================================================================
// Percent
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 12.5% is exactly 1250 bps.
/// Discounts and surcharges typed with two decimals never lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from a decimal value (12.5 → 1250 bps).
    ///
    /// Negative or non-finite input yields zero.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return Percent(0);
        }
        Percent((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// 100%.
    #[inline]
    pub const fn full() -> Self {
        Percent(10_000)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Sale Mode
// =============================================================================

/// How a product is sold, derived from its unit-of-sale descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleMode {
    /// Discrete count: integer quantity, clamped to stock.
    Unit,
    /// Continuous measure (weight/volume): quantity and amount linked.
    Bulk,
}

impl Default for SaleMode {
    fn default() -> Self {
        SaleMode::Unit
    }
}

// =============================================================================
// Price List
// =============================================================================

/// Which unit price applies to a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceList {
    Retail,
    Wholesale,
}

// =============================================================================
// Product
// =============================================================================

/// A sellable product as mirrored from the backend catalog.
///
/// Prices are validated non-negative when the record is parsed at the
/// backend boundary; nothing downstream re-checks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Backend identifier, always > 0 for catalog products.
    pub id: i64,

    /// Display name shown to the cashier and on the document.
    pub name: String,

    /// Barcode / internal code used by the scanner.
    pub code: Option<String>,

    /// Retail (final consumer) unit price.
    pub retail_price: Money,

    /// Wholesale unit price.
    pub wholesale_price: Money,

    /// Current stock. `None` when the backend does not track it.
    pub stock: Option<Quantity>,

    /// Free-text unit of sale ("kg", "unidad", "sin información", ...).
    pub unit_of_sale: String,

    /// VAT rate in basis points (2100 = 21%).
    pub tax_rate_bps: u32,

    /// Inactive products are kept out of the mirror.
    pub active: bool,
}

impl Product {
    /// Returns the unit price for the given price list.
    #[inline]
    pub fn price_for(&self, list: PriceList) -> Money {
        match list {
            PriceList::Retail => self.retail_price,
            PriceList::Wholesale => self.wholesale_price,
        }
    }

    /// Classifies the unit-of-sale descriptor.
    #[inline]
    pub fn sale_mode(&self) -> SaleMode {
        classify_unit_of_sale(&self.unit_of_sale)
    }

    /// Checks if the scan code matches, ignoring case and surrounding spaces.
    pub fn matches_code(&self, code: &str) -> bool {
        self.code
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case(code.trim()))
            .unwrap_or(false)
    }
}

// =============================================================================
// Client Context
// =============================================================================

/// A client registered in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisteredClient {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    /// Buys at wholesale prices.
    pub wholesale: bool,
}

/// Who the sale is for.
///
/// ```text
/// FinalConsumer ── walk-in sale; a CUIT may be typed by hand
/// Registered ───── sale against a backend client (must be picked)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientContext {
    FinalConsumer { tax_id: Option<String> },
    Registered { client: Option<RegisteredClient> },
}

impl ClientContext {
    /// Final consumer without a tax id.
    pub fn final_consumer() -> Self {
        ClientContext::FinalConsumer { tax_id: None }
    }

    /// The price list this client buys at.
    pub fn price_list(&self) -> PriceList {
        match self {
            ClientContext::Registered {
                client: Some(client),
            } if client.wholesale => PriceList::Wholesale,
            _ => PriceList::Retail,
        }
    }

    /// The tax id used for document resolution.
    ///
    /// Manual entry for final consumers, the stored one for registered
    /// clients. Blank strings count as absent.
    pub fn resolved_tax_id(&self) -> Option<&str> {
        let raw = match self {
            ClientContext::FinalConsumer { tax_id } => tax_id.as_deref(),
            ClientContext::Registered { client } => {
                client.as_ref().and_then(|c| c.tax_id.as_deref())
            }
        };
        raw.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Backend client id, `None` for final consumers.
    pub fn client_id(&self) -> Option<i64> {
        match self {
            ClientContext::FinalConsumer { .. } => None,
            ClientContext::Registered { client } => client.as_ref().map(|c| c.id),
        }
    }

    #[inline]
    pub fn is_final_consumer(&self) -> bool {
        matches!(self, ClientContext::FinalConsumer { .. })
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        ClientContext::final_consumer()
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a payment entry is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    /// Physical cash; the only method that computes change.
    #[serde(rename = "efectivo")]
    Cash,
    /// Bank transfer.
    #[serde(rename = "transferencia")]
    Transfer,
    /// Card through the bank terminal (posnet).
    #[serde(rename = "bancario")]
    BankPos,
    /// Charged to the client's account.
    #[serde(rename = "cuenta_corriente")]
    CurrentAccount,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Transfer,
        PaymentMethod::BankPos,
        PaymentMethod::CurrentAccount,
    ];

    /// Name used by the backend.
    pub fn wire_name(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "efectivo",
            PaymentMethod::Transfer => "transferencia",
            PaymentMethod::BankPos => "bancario",
            PaymentMethod::CurrentAccount => "cuenta_corriente",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "efectivo" | "cash" => Ok(PaymentMethod::Cash),
            "transferencia" | "transfer" => Ok(PaymentMethod::Transfer),
            "bancario" | "posnet" | "tarjeta" | "card" => Ok(PaymentMethod::BankPos),
            "cuenta_corriente" | "cuenta corriente" | "account" => {
                Ok(PaymentMethod::CurrentAccount)
            }
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.wire_name().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

/// The document the cashier asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Factura,
    Comprobante,
    Remito,
    Presupuesto,
}

impl Default for DocumentKind {
    fn default() -> Self {
        DocumentKind::Comprobante
    }
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Factura => "factura",
            DocumentKind::Comprobante => "comprobante",
            DocumentKind::Remito => "remito",
            DocumentKind::Presupuesto => "presupuesto",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "factura" => Ok(DocumentKind::Factura),
            "comprobante" => Ok(DocumentKind::Comprobante),
            "remito" => Ok(DocumentKind::Remito),
            "presupuesto" => Ok(DocumentKind::Presupuesto),
            _ => Err(ValidationError::NotAllowed {
                field: "document_kind".to_string(),
                allowed: ["factura", "comprobante", "remito", "presupuesto"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

/// The concrete document submitted to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSubtype {
    FacturaA,
    FacturaB,
    Recibo,
    Remito,
    Presupuesto,
}

impl DocumentSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSubtype::FacturaA => "factura_a",
            DocumentSubtype::FacturaB => "factura_b",
            DocumentSubtype::Recibo => "recibo",
            DocumentSubtype::Remito => "remito",
            DocumentSubtype::Presupuesto => "presupuesto",
        }
    }

    /// True for the fiscal invoice subtypes.
    pub fn is_invoice(&self) -> bool {
        matches!(self, DocumentSubtype::FacturaA | DocumentSubtype::FacturaB)
    }
}

impl fmt::Display for DocumentSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Source
// =============================================================================

/// Which producer appended a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    Manual,
    Scanner,
    Scale,
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSource::Manual => write!(f, "manual"),
            LineSource::Scanner => write!(f, "scanner"),
            LineSource::Scale => write!(f, "scale"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(unit: &str) -> Product {
        Product {
            id: 1,
            name: "Queso".to_string(),
            code: Some("779123".to_string()),
            retail_price: Money::from_units(1000),
            wholesale_price: Money::from_units(800),
            stock: None,
            unit_of_sale: unit.to_string(),
            tax_rate_bps: 2100,
            active: true,
        }
    }

    #[test]
    fn test_percent_from_percentage() {
        assert_eq!(Percent::from_percentage(12.5).bps(), 1250);
        assert_eq!(Percent::from_percentage(-3.0).bps(), 0);
        assert_eq!(Percent::from_percentage(f64::NAN).bps(), 0);
        assert_eq!(Percent::from_bps(1250).to_string(), "12.50%");
    }

    #[test]
    fn test_price_list_follows_client() {
        let p = product("kg");
        let wholesale = ClientContext::Registered {
            client: Some(RegisteredClient {
                id: 9,
                name: "Almacén".to_string(),
                tax_id: None,
                wholesale: true,
            }),
        };
        assert_eq!(p.price_for(wholesale.price_list()), Money::from_units(800));
        assert_eq!(
            p.price_for(ClientContext::final_consumer().price_list()),
            Money::from_units(1000)
        );
    }

    #[test]
    fn test_resolved_tax_id_ignores_blanks() {
        let ctx = ClientContext::FinalConsumer {
            tax_id: Some("   ".to_string()),
        };
        assert_eq!(ctx.resolved_tax_id(), None);

        let ctx = ClientContext::FinalConsumer {
            tax_id: Some(" 20304050607 ".to_string()),
        };
        assert_eq!(ctx.resolved_tax_id(), Some("20304050607"));
    }

    #[test]
    fn test_matches_code() {
        assert!(product("kg").matches_code(" 779123 "));
        assert!(!product("kg").matches_code("779"));
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankPos).unwrap(),
            "\"bancario\""
        );
        assert_eq!("Efectivo".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_document_kind_parsing() {
        assert_eq!("FACTURA".parse::<DocumentKind>().unwrap(), DocumentKind::Factura);
        assert_eq!(DocumentKind::default(), DocumentKind::Comprobante);
        assert!("ticket".parse::<DocumentKind>().is_err());
        assert_eq!(
            serde_json::to_string(&DocumentSubtype::FacturaA).unwrap(),
            "\"factura_a\""
        );
    }
}
