//! # Pricing Engine
//!
//! Pure pricing rules: unit-of-sale classification, unit vs bulk amounts,
//! discount composition and payment-method surcharges.
//!
//! ## Price Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   base = qty × unit price          (unit: whole qty, bulk: 3 decimals)  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │   line total = max(0, base − base×pct − nominal)                        │
//! │     │                                                                   │
//! │     ▼  Σ                                                                │
//! │   subtotal                                                              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │   net = max(0, subtotal − subtotal×pct − nominal)                       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │   final = net + surcharge(method)   (transfer / bank POS, toggled on)   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{PaymentMethod, Percent, SaleMode};
use crate::MAX_UNIT_QUANTITY;

// =============================================================================
// Unit of Sale Classification
// =============================================================================

const BULK_TOKENS: [&str; 7] = ["kg", "g", "l", "ml", "litro", "litros", "gramo"];

const UNIT_TOKENS: [&str; 9] = [
    "unidad", "unidades", "unit", "units", "und", "pza", "pzas", "pieza", "piezas",
];

/// Splits a normalized descriptor into alphabetic tokens.
///
/// Digits and punctuation separate tokens, so `"1kg"` and `"kg."` both
/// yield `["kg"]`.
fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
}

fn is_bulk_token(token: &str) -> bool {
    if token.contains("gm") && token.contains('u') {
        return false;
    }
    BULK_TOKENS.contains(&token) || token.contains("gram") || token.contains("gm")
}

fn is_unit_token(token: &str) -> bool {
    UNIT_TOKENS.contains(&token) || token.starts_with("un")
}

/// Classifies a free-text unit-of-sale descriptor.
///
/// Whitespace is removed before tokenizing. Anything unrecognized,
/// including empty strings, is sold by unit.
///
/// ## Example
/// ```rust
/// use mostrador_core::pricing::classify_unit_of_sale;
/// use mostrador_core::SaleMode;
///
/// assert_eq!(classify_unit_of_sale(" KG "), SaleMode::Bulk);
/// assert_eq!(classify_unit_of_sale("gramos"), SaleMode::Bulk);
/// assert_eq!(classify_unit_of_sale("unidad"), SaleMode::Unit);
/// assert_eq!(classify_unit_of_sale("sin información"), SaleMode::Unit);
/// ```
pub fn classify_unit_of_sale(raw: &str) -> SaleMode {
    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if tokens(&normalized).any(is_bulk_token) {
        return SaleMode::Bulk;
    }
    if tokens(&normalized).any(is_unit_token) {
        return SaleMode::Unit;
    }
    SaleMode::Unit
}

// =============================================================================
// Line Amounts
// =============================================================================

/// Clamps a unit-mode quantity to `[1, stock]`.
///
/// Unknown stock leaves only the cart-wide ceiling of MAX_UNIT_QUANTITY.
/// Zero or negative stock still yields one unit so the line stays sellable.
pub fn clamp_unit_quantity(requested: i64, stock: Option<Quantity>) -> i64 {
    let cap = stock
        .map(|s| s.whole_units().min(MAX_UNIT_QUANTITY))
        .unwrap_or(MAX_UNIT_QUANTITY);
    requested.min(cap).max(1)
}

/// Bulk mode, quantity edited: `amount = round(qty × price, 2)`.
#[inline]
pub fn bulk_amount_for(qty: Quantity, unit_price: Money) -> Money {
    unit_price.multiply_quantity(qty)
}

/// Bulk mode, amount edited: `qty = round(amount ÷ price, 3)`.
///
/// `None` for free products, where no quantity can be derived.
#[inline]
pub fn bulk_quantity_for(amount: Money, unit_price: Money) -> Option<Quantity> {
    Quantity::from_amount(amount, unit_price)
}

/// Base amount of a line before discounts.
pub fn base_amount(mode: SaleMode, qty: Quantity, unit_price: Money) -> Money {
    match mode {
        SaleMode::Unit => unit_price * qty.whole_units(),
        SaleMode::Bulk => bulk_amount_for(qty, unit_price),
    }
}

// =============================================================================
// Discounts
// =============================================================================

/// Applies a percentage then a nominal discount, floored at zero.
///
/// ## Example
/// ```rust
/// use mostrador_core::money::Money;
/// use mostrador_core::pricing::line_total;
/// use mostrador_core::types::Percent;
///
/// let base = Money::from_units(100);
/// assert_eq!(line_total(base, Percent::from_bps(1000), Money::from_units(5)), Money::from_units(85));
/// assert_eq!(line_total(base, Percent::zero(), Money::from_units(500)), Money::zero());
/// ```
#[inline]
pub fn line_total(base: Money, pct: Percent, nominal: Money) -> Money {
    (base.apply_percentage_discount(pct) - nominal).non_negative()
}

/// Global discount over the cart subtotal. Same composition as a line.
#[inline]
pub fn net_total(subtotal: Money, pct: Percent, nominal: Money) -> Money {
    line_total(subtotal, pct, nominal)
}

// =============================================================================
// Surcharges
// =============================================================================

/// One method's surcharge: a configured rate and the cashier's toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Surcharge {
    pub rate: Percent,
    pub enabled: bool,
}

impl Surcharge {
    pub fn new(rate: Percent, enabled: bool) -> Self {
        Surcharge { rate, enabled }
    }
}

/// Surcharges for the methods that carry one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SurchargeSettings {
    pub transfer: Surcharge,
    pub bank_pos: Surcharge,
}

impl SurchargeSettings {
    /// The surcharge that applies to `method`, if any is active.
    pub fn active_for(&self, method: PaymentMethod) -> Option<Percent> {
        let surcharge = match method {
            PaymentMethod::Transfer => self.transfer,
            PaymentMethod::BankPos => self.bank_pos,
            PaymentMethod::Cash | PaymentMethod::CurrentAccount => return None,
        };
        (surcharge.enabled && !surcharge.rate.is_zero()).then_some(surcharge.rate)
    }

    /// Flips the toggle for a surcharge-bearing method. Other methods are
    /// ignored.
    pub fn set_enabled(&mut self, method: PaymentMethod, enabled: bool) {
        match method {
            PaymentMethod::Transfer => self.transfer.enabled = enabled,
            PaymentMethod::BankPos => self.bank_pos.enabled = enabled,
            PaymentMethod::Cash | PaymentMethod::CurrentAccount => {}
        }
    }
}

/// Surcharge amount on `net` for the active method, rounded to the cent.
pub fn surcharge_for(
    net: Money,
    method: Option<PaymentMethod>,
    settings: &SurchargeSettings,
) -> Money {
    method
        .and_then(|m| settings.active_for(m))
        .map(|rate| net.percentage_of(rate))
        .unwrap_or_default()
}

// =============================================================================
// Totals
// =============================================================================

/// Every figure the checkout screen shows, derived in one place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    /// Σ base amounts, before any discount.
    pub list_total: Money,
    /// Σ line totals.
    pub subtotal: Money,
    /// After the global discount.
    pub net: Money,
    pub surcharge: Money,
    /// What the customer pays.
    pub final_total: Money,
}

impl Totals {
    /// Adds the method surcharge on top of already-discounted figures.
    pub fn with_surcharge(
        list_total: Money,
        subtotal: Money,
        net: Money,
        method: Option<PaymentMethod>,
        settings: &SurchargeSettings,
    ) -> Self {
        let surcharge = surcharge_for(net, method, settings);
        Totals {
            list_total,
            subtotal,
            net,
            surcharge,
            final_total: net + surcharge,
        }
    }

    /// Audit discount total: pre-discount list total minus net.
    #[inline]
    pub fn discount_total(&self) -> Money {
        self.list_total - self.net
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
