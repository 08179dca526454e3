//! # Checkout Validation
//!
//! Ordered pre-submit rules. The first failing rule wins and nothing
//! reaches the network.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. payment panel acknowledged ───────── PaymentPanelClosed             │
//! │  2. cart not empty ───────────────────── EmptyCart                      │
//! │  3. payment reconciles with final ────── PaymentNotSelected /           │
//! │                                          CashShortfall / Reconciliation │
//! │  4. registered sale has a client ─────── ClientNotSelected              │
//! │  5. large final-consumer sale has CUIT ─ Validation(tax_id)             │
//! │  6. every line maps to a known product ─ UnresolvedLines                │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │              Transaction                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule 6 runs against the catalog as it is now, not as it was when the
//! line was added.

use chrono::Utc;

use crate::cart::Cart;
use crate::document::{require_tax_id_for_large_sale, resolve_subtype};
use crate::error::{CoreError, CoreResult};
use crate::payment::PaymentReconciler;
use crate::pricing::SurchargeSettings;
use crate::transaction::{Transaction, TransactionLine};
use crate::types::{ClientContext, DocumentKind};

/// Everything checkout reads besides the catalog.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    pub cart: &'a Cart,
    pub payment: &'a PaymentReconciler,
    pub panel_acknowledged: bool,
    pub kind: DocumentKind,
    pub surcharges: &'a SurchargeSettings,
    pub observations: Option<&'a str>,
}

/// Runs the checkout rules and assembles the transaction.
///
/// `is_known_product` answers whether a product id currently exists in the
/// catalog mirror.
pub fn prepare_transaction<F>(req: CheckoutRequest<'_>, is_known_product: F) -> CoreResult<Transaction>
where
    F: Fn(i64) -> bool,
{
    let cart = req.cart;

    // 1
    if !req.panel_acknowledged {
        return Err(CoreError::PaymentPanelClosed);
    }

    // 2
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    // 3
    let totals = cart
        .totals()
        .with_method(req.payment.active_method(), req.surcharges);
    let payment = req.payment.validate(totals.final_total)?;

    // 4
    if let ClientContext::Registered { client: None } = cart.client {
        return Err(CoreError::ClientNotSelected);
    }

    // 5
    require_tax_id_for_large_sale(&cart.client, totals.net)?;

    // 6
    let unresolved: Vec<String> = cart
        .lines
        .iter()
        .filter(|l| !matches!(l.product_id, Some(id) if id > 0 && is_known_product(id)))
        .map(|l| l.name.clone())
        .collect();
    if !unresolved.is_empty() {
        return Err(CoreError::UnresolvedLines { lines: unresolved });
    }

    let lines = cart
        .lines
        .iter()
        .filter_map(TransactionLine::from_cart_line)
        .collect();

    let tax_id = cart.client.resolved_tax_id().map(str::to_string);
    let observations = req
        .observations
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Transaction {
        local_id: Transaction::new_local_id(),
        client_id: cart.client.client_id(),
        subtype: resolve_subtype(req.kind, tax_id.as_deref()),
        tax_id,
        lines,
        net_total: totals.net,
        surcharge: totals.surcharge,
        final_total: totals.final_total,
        discount_total: totals.discount_total(),
        payment,
        requested_kind: req.kind,
        observations,
        created_at: Utc::now(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
