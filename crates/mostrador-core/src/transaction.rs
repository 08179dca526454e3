//! # Transaction
//!
//! The finalized sale, assembled once checkout validation passes.
//! Nothing mutates a transaction after it is built; the engine serializes
//! it for submission and keeps it for the print request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::CartLine;
use crate::money::Money;
use crate::payment::PaymentSummary;
use crate::quantity::Quantity;
use crate::types::{DocumentKind, DocumentSubtype};

/// A sold line. Only lines resolved to a catalog product get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionLine {
    pub product_id: i64,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    /// Line total after line discounts.
    pub subtotal: Money,
    pub tax_rate_bps: u32,
}

impl TransactionLine {
    /// `None` for ad-hoc lines without a product.
    pub fn from_cart_line(line: &CartLine) -> Option<Self> {
        Some(TransactionLine {
            product_id: line.product_id?,
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.total(),
            tax_rate_bps: line.tax_rate_bps,
        })
    }
}

/// A validated sale ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    /// Local identifier for logs and print retries (UUID v4).
    pub local_id: String,

    /// Backend client id, `None` for final consumers.
    pub client_id: Option<i64>,

    /// Tax id printed on the document, if any.
    pub tax_id: Option<String>,

    pub lines: Vec<TransactionLine>,

    /// Total after all discounts, before surcharge.
    pub net_total: Money,

    pub surcharge: Money,

    /// What the customer pays.
    pub final_total: Money,

    /// Pre-discount list total minus net total.
    pub discount_total: Money,

    pub payment: PaymentSummary,

    pub requested_kind: DocumentKind,

    pub subtype: DocumentSubtype,

    pub observations: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn new_local_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// True when the customer asked for a fiscal invoice.
    #[inline]
    pub fn wants_invoice(&self) -> bool {
        self.requested_kind == DocumentKind::Factura
    }
}
