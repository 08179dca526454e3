//! # Cart Module
//!
//! The in-progress sale: ordered lines, global discounts and the client.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cart Operations                                 │
//! │                                                                         │
//! │  Input producer            Operation                  State change      │
//! │  ──────────────            ─────────                  ────────────      │
//! │  manual / scanner / scale ► append_line() ──────────► lines.push(line)  │
//! │  quantity field ──────────► set_quantity() ─────────► qty, amount       │
//! │  amount field (bulk) ─────► set_amount() ───────────► amount, qty       │
//! │  line discount ───────────► set_line_discount() ────► pct, nominal      │
//! │  global discount ─────────► set_global_discount() ──► pct, nominal      │
//! │  client picker ───────────► set_client() ───────────► reprice lines     │
//! │  successful submit ───────► clear_submitted() ──────► drop sold lines   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart itself is plain data. The engine wraps it in a single-writer
//! actor so the three input producers never interleave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{self, SurchargeSettings, Totals};
use crate::quantity::Quantity;
use crate::types::{ClientContext, LineSource, PaymentMethod, Percent, PriceList, Product, SaleMode};
use crate::validation;
use crate::MAX_CART_LINES;

// =============================================================================
// Cart Line
// =============================================================================

/// Both list prices of a catalog product, frozen when the line was added.
///
/// Kept so a client change can switch the line between retail and
/// wholesale without going back to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceSnapshot {
    pub retail: Money,
    pub wholesale: Money,
}

impl PriceSnapshot {
    pub fn for_list(&self, list: PriceList) -> Money {
        match list {
            PriceList::Retail => self.retail,
            PriceList::Wholesale => self.wholesale,
        }
    }
}

/// A line in the cart.
///
/// ## Design Notes
/// - `product_id`: `None` for ad-hoc lines built from raw scale data.
///   Those lines never pass checkout.
/// - `name`, `unit_price`, `tax_rate_bps` are snapshots. A catalog refresh
///   never alters a line already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Stable line identifier (UUID v4).
    pub line_id: String,

    pub product_id: Option<i64>,

    pub name: String,

    /// Unit price in the client's price list.
    pub unit_price: Money,

    pub prices: Option<PriceSnapshot>,

    pub mode: SaleMode,

    pub quantity: Quantity,

    /// Base amount: quantity × unit price, before line discounts.
    pub amount: Money,

    pub discount_pct: Percent,

    pub discount_nominal: Money,

    /// Stock at the time the line was added, for unit-mode clamping.
    pub stock: Option<Quantity>,

    pub tax_rate_bps: u32,

    pub source: LineSource,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Line total after line discounts, never negative.
    #[inline]
    pub fn total(&self) -> Money {
        pricing::line_total(self.amount, self.discount_pct, self.discount_nominal)
    }

    fn recompute_amount(&mut self) {
        self.amount = pricing::base_amount(self.mode, self.quantity, self.unit_price);
    }
}

/// What an input producer asks the cart to append.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRequest {
    pub product_id: Option<i64>,
    pub name: String,
    pub unit_price: Money,
    pub prices: Option<PriceSnapshot>,
    pub mode: SaleMode,
    pub quantity: Quantity,
    pub stock: Option<Quantity>,
    pub tax_rate_bps: u32,
    pub source: LineSource,
}

impl LineRequest {
    /// A line for a catalog product, priced for `list`.
    pub fn from_product(
        product: &Product,
        list: PriceList,
        quantity: Quantity,
        source: LineSource,
    ) -> Self {
        LineRequest {
            product_id: Some(product.id),
            name: product.name.clone(),
            unit_price: product.price_for(list),
            prices: Some(PriceSnapshot {
                retail: product.retail_price,
                wholesale: product.wholesale_price,
            }),
            mode: product.sale_mode(),
            quantity,
            stock: product.stock,
            tax_rate_bps: product.tax_rate_bps,
            source,
        }
    }

    /// A bulk line carrying only a name and a price (no catalog product).
    pub fn ad_hoc(name: impl Into<String>, unit_price: Money, quantity: Quantity, source: LineSource) -> Self {
        LineRequest {
            product_id: None,
            name: name.into(),
            unit_price,
            prices: None,
            mode: SaleMode::Bulk,
            quantity,
            stock: None,
            tax_rate_bps: 0,
            source,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The shopping cart.
///
/// ## Invariants
/// - At most MAX_CART_LINES lines
/// - Unit lines hold whole quantities in `[1, stock]` (at most MAX_UNIT_QUANTITY)
/// - Bulk lines keep `amount = round(quantity × unit_price, 2)`
/// - Every total is floored at zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub global_discount_pct: Percent,
    pub global_discount_nominal: Money,
    pub client: ClientContext,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    /// Creates a new empty cart for a final consumer.
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            global_discount_pct: Percent::zero(),
            global_discount_nominal: Money::zero(),
            client: ClientContext::default(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    fn line_mut(&mut self, line_id: &str) -> CoreResult<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|l| l.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))
    }

    /// Appends a line and returns it.
    ///
    /// ## Behavior
    /// - Unit mode: quantity is clamped to `[1, stock]`
    /// - Bulk mode: quantity must not be negative; amount is derived
    /// - Every append creates a new line (same product scanned twice is two
    ///   lines, in scan order)
    pub fn append_line(&mut self, req: LineRequest) -> CoreResult<&CartLine> {
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }
        validation::validate_price(req.unit_price)?;

        let quantity = match req.mode {
            SaleMode::Unit => Quantity::from_units(pricing::clamp_unit_quantity(
                req.quantity.whole_units(),
                req.stock,
            )),
            SaleMode::Bulk => {
                validation::validate_bulk_quantity(req.quantity)?;
                req.quantity
            }
        };

        let mut line = CartLine {
            line_id: Uuid::new_v4().to_string(),
            product_id: req.product_id,
            name: req.name,
            unit_price: req.unit_price,
            prices: req.prices,
            mode: req.mode,
            quantity,
            amount: Money::zero(),
            discount_pct: Percent::zero(),
            discount_nominal: Money::zero(),
            stock: req.stock,
            tax_rate_bps: req.tax_rate_bps,
            source: req.source,
            added_at: Utc::now(),
        };
        line.recompute_amount();

        self.lines.push(line);
        let idx = self.lines.len() - 1;
        Ok(&self.lines[idx])
    }

    /// Edits a line's quantity and recomputes its amount.
    ///
    /// Unit mode drops any fraction and clamps to `[1, stock]`, the same as
    /// [`Cart::append_line`].
    pub fn set_quantity(&mut self, line_id: &str, quantity: Quantity) -> CoreResult<()> {
        let line = self.line_mut(line_id)?;
        match line.mode {
            SaleMode::Unit => {
                line.quantity = Quantity::from_units(pricing::clamp_unit_quantity(
                    quantity.whole_units(),
                    line.stock,
                ));
            }
            SaleMode::Bulk => {
                validation::validate_bulk_quantity(quantity)?;
                line.quantity = quantity;
            }
        }
        line.recompute_amount();
        Ok(())
    }

    /// Edits a bulk line's amount and derives the quantity from it.
    pub fn set_amount(&mut self, line_id: &str, amount: Money) -> CoreResult<()> {
        let line = self.line_mut(line_id)?;
        if line.mode != SaleMode::Bulk {
            return Err(CoreError::NotBulkLine(line_id.to_string()));
        }
        if amount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "amount".to_string(),
            }
            .into());
        }

        let quantity = pricing::bulk_quantity_for(amount, line.unit_price).ok_or_else(|| {
            ValidationError::MustBePositive {
                field: "unit_price".to_string(),
            }
        })?;
        line.quantity = quantity;
        line.amount = amount;
        Ok(())
    }

    pub fn set_line_discount(&mut self, line_id: &str, pct: Percent, nominal: Money) -> CoreResult<()> {
        validation::validate_discount_percent("line_discount_pct", pct)?;
        validation::validate_nominal_discount("line_discount_nominal", nominal)?;
        let line = self.line_mut(line_id)?;
        line.discount_pct = pct;
        line.discount_nominal = nominal;
        Ok(())
    }

    /// Removes a line, returning it.
    pub fn remove_line(&mut self, line_id: &str) -> CoreResult<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;
        Ok(self.lines.remove(idx))
    }

    pub fn set_global_discount(&mut self, pct: Percent, nominal: Money) -> CoreResult<()> {
        validation::validate_discount_percent("global_discount_pct", pct)?;
        validation::validate_nominal_discount("global_discount_nominal", nominal)?;
        self.global_discount_pct = pct;
        self.global_discount_nominal = nominal;
        Ok(())
    }

    /// Switches the client and reprices catalog lines for its price list.
    ///
    /// Ad-hoc lines keep the price they arrived with.
    pub fn set_client(&mut self, client: ClientContext) {
        let list = client.price_list();
        for line in &mut self.lines {
            if let Some(prices) = line.prices {
                line.unit_price = prices.for_list(list);
                line.recompute_amount();
            }
        }
        self.client = client;
    }

    /// Back to the initial state: no lines, no discounts, final consumer.
    pub fn clear(&mut self) {
        *self = Cart::new();
    }

    /// Removes the lines of a submitted sale and starts the next one.
    ///
    /// Lines not in `sold` (appended while the sale was in flight) stay,
    /// repriced for a final consumer. Discounts and the client go back to
    /// their defaults. Returns how many lines are left.
    pub fn clear_submitted(&mut self, sold: &[String]) -> usize {
        self.lines.retain(|l| !sold.contains(&l.line_id));
        self.global_discount_pct = Percent::zero();
        self.global_discount_nominal = Money::zero();
        self.set_client(ClientContext::default());
        self.created_at = Utc::now();
        self.lines.len()
    }

    /// Ids of every line, in cart order.
    pub fn line_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.line_id.clone()).collect()
    }

    /// Σ base amounts before any discount.
    pub fn list_total(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// Σ line totals.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::total).sum()
    }

    /// Subtotal after the global discount.
    pub fn net_total(&self) -> Money {
        pricing::net_total(
            self.subtotal(),
            self.global_discount_pct,
            self.global_discount_nominal,
        )
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Cart figures that do not depend on the payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub list_total: Money,
    pub subtotal: Money,
    pub net: Money,
}

impl CartTotals {
    /// Adds the payment-method surcharge.
    pub fn with_method(&self, method: Option<PaymentMethod>, settings: &SurchargeSettings) -> Totals {
        Totals::with_surcharge(self.list_total, self.subtotal, self.net, method, settings)
    }
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            list_total: cart.list_total(),
            subtotal: cart.subtotal(),
            net: cart.net_total(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegisteredClient;

    fn product(id: i64, price_units: i64, unit: &str) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            code: Some(format!("CODE-{}", id)),
            retail_price: Money::from_units(price_units),
            wholesale_price: Money::from_units(price_units * 8 / 10),
            stock: Some(Quantity::from_units(10)),
            unit_of_sale: unit.to_string(),
            tax_rate_bps: 2100,
            active: true,
        }
    }

    fn append(cart: &mut Cart, p: &Product, qty: Quantity) -> String {
        let req = LineRequest::from_product(p, cart.client.price_list(), qty, LineSource::Manual);
        cart.append_line(req).unwrap().line_id.clone()
    }

    #[test]
    fn test_unit_line_amount() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::from_units(3));

        let line = cart.line(&id).unwrap();
        assert_eq!(line.amount, Money::from_units(300));
        assert_eq!(line.total(), Money::from_units(300));
        assert_eq!(cart.net_total(), Money::from_units(300));
    }

    #[test]
    fn test_unit_quantity_clamped_to_stock() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::from_units(25));
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::from_units(10));

        cart.set_quantity(&id, Quantity::from_units(12)).unwrap();
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::from_units(10));

        cart.set_quantity(&id, Quantity::zero()).unwrap();
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::one());
        assert_eq!(cart.line(&id).unwrap().amount, Money::from_units(100));

        cart.set_quantity(&id, Quantity::from_milli(2_500)).unwrap();
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::from_units(2));
    }

    #[test]
    fn test_unit_quantity_without_stock_capped_at_ceiling() {
        let mut cart = Cart::new();
        let mut p = product(1, 1, "unidad");
        p.stock = None;
        let id = append(&mut cart, &p, Quantity::zero());
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::one());

        cart.set_quantity(&id, Quantity::from_units(50_000)).unwrap();
        assert_eq!(
            cart.line(&id).unwrap().quantity,
            Quantity::from_units(crate::MAX_UNIT_QUANTITY)
        );
    }

    #[test]
    fn test_same_product_appends_separate_lines() {
        let mut cart = Cart::new();
        let p = product(1, 100, "unidad");
        append(&mut cart, &p, Quantity::one());
        append(&mut cart, &p, Quantity::one());
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_bulk_quantity_and_amount_are_linked() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(2, 1000, "kg"), Quantity::from_milli(250));
        assert_eq!(cart.line(&id).unwrap().amount, Money::from_units(250));

        cart.set_amount(&id, Money::from_units(500)).unwrap();
        assert_eq!(cart.line(&id).unwrap().quantity, Quantity::from_milli(500));

        cart.set_quantity(&id, Quantity::from_milli(1_250)).unwrap();
        assert_eq!(cart.line(&id).unwrap().amount, Money::from_units(1250));
    }

    #[test]
    fn test_set_amount_rejects_unit_lines() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::one());
        let err = cart.set_amount(&id, Money::from_units(50)).unwrap_err();
        assert!(matches!(err, CoreError::NotBulkLine(_)));
    }

    #[test]
    fn test_discounts_compose() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::from_units(10));

        // 1000 − 10% − 50 = 850
        cart.set_line_discount(&id, Percent::from_bps(1000), Money::from_units(50)).unwrap();
        assert_eq!(cart.subtotal(), Money::from_units(850));

        // 850 − 20% − 80 = 600
        cart.set_global_discount(Percent::from_bps(2000), Money::from_units(80)).unwrap();
        assert_eq!(cart.net_total(), Money::from_units(600));
        assert_eq!(cart.list_total(), Money::from_units(1000));

        assert!(cart.set_global_discount(Percent::from_bps(10_001), Money::zero()).is_err());
        assert!(cart.set_line_discount(&id, Percent::zero(), Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_nominal_discount_larger_than_total_floors_at_zero() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::one());
        cart.set_line_discount(&id, Percent::zero(), Money::from_units(500)).unwrap();
        assert_eq!(cart.subtotal(), Money::zero());
    }

    #[test]
    fn test_client_change_reprices_catalog_lines() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::from_units(2));
        cart.append_line(LineRequest::ad_hoc("Pesada", Money::from_units(1000), Quantity::from_milli(100), LineSource::Scale))
            .unwrap();

        cart.set_client(ClientContext::Registered {
            client: Some(RegisteredClient {
                id: 7,
                name: "Almacén Norte".to_string(),
                tax_id: None,
                wholesale: true,
            }),
        });

        assert_eq!(cart.line(&id).unwrap().amount, Money::from_units(160));
        assert_eq!(cart.lines[1].amount, Money::from_units(100));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        let id = append(&mut cart, &product(1, 100, "unidad"), Quantity::one());
        assert!(cart.remove_line("missing").is_err());
        cart.remove_line(&id).unwrap();
        assert!(cart.is_empty());

        append(&mut cart, &product(1, 100, "unidad"), Quantity::one());
        cart.set_global_discount(Percent::from_bps(500), Money::zero()).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.global_discount_pct.is_zero());
        assert!(cart.client.is_final_consumer());
    }

    #[test]
    fn test_clear_submitted_keeps_later_lines() {
        let mut cart = Cart::new();
        cart.set_client(ClientContext::Registered {
            client: Some(RegisteredClient {
                id: 7,
                name: "Almacén Norte".to_string(),
                tax_id: None,
                wholesale: true,
            }),
        });
        append(&mut cart, &product(1, 100, "unidad"), Quantity::from_units(2));
        cart.set_global_discount(Percent::from_bps(1000), Money::zero()).unwrap();
        let sold = cart.line_ids();

        let late = append(&mut cart, &product(2, 100, "unidad"), Quantity::one());
        assert_eq!(cart.line(&late).unwrap().amount, Money::from_units(80));

        assert_eq!(cart.clear_submitted(&sold), 1);
        assert_eq!(cart.lines[0].line_id, late);
        assert_eq!(cart.lines[0].amount, Money::from_units(100));
        assert!(cart.global_discount_pct.is_zero());
        assert!(cart.client.is_final_consumer());
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new();
        let p = product(1, 1, "unidad");
        for _ in 0..MAX_CART_LINES {
            append(&mut cart, &p, Quantity::one());
        }
        let req = LineRequest::from_product(&p, PriceList::Retail, Quantity::one(), LineSource::Scanner);
        assert!(matches!(cart.append_line(req), Err(CoreError::CartTooLarge { .. })));
    }
}
