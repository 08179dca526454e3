//! # Quantity Module
//!
//! Quantities are stored in thousandths of a unit ("milli-units").
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UNIT MODE                         BULK MODE                            │
//! │  ─────────                         ─────────                            │
//! │  3 units   → 3000 milli            0.250 kg → 250 milli                 │
//! │  always a multiple of 1000         3 decimals, as weighed or derived    │
//! │                                    from an amount typed by the cashier  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{div_round, Money};

/// Milli-units per whole unit.
pub const MILLI_PER_UNIT: i64 = 1_000;

/// A quantity in thousandths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    /// One whole unit.
    #[inline]
    pub const fn one() -> Self {
        Quantity(MILLI_PER_UNIT)
    }

    /// Returns the raw thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit part, truncated toward zero.
    #[inline]
    pub const fn whole_units(&self) -> i64 {
        self.0 / MILLI_PER_UNIT
    }

    /// True when the quantity has no fractional part.
    #[inline]
    pub const fn is_whole(&self) -> bool {
        self.0 % MILLI_PER_UNIT == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Derives a quantity from an amount and a unit price.
    ///
    /// `amount ÷ unit_price`, rounded to 3 decimals. Returns `None` when the
    /// unit price is not positive (the division is undefined).
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::quantity::Quantity;
    ///
    /// let qty = Quantity::from_amount(Money::from_units(250), Money::from_units(1000));
    /// assert_eq!(qty, Some(Quantity::from_milli(250)));
    /// ```
    pub fn from_amount(amount: Money, unit_price: Money) -> Option<Quantity> {
        if !unit_price.is_positive() {
            return None;
        }
        let milli = div_round(
            amount.cents() as i128 * MILLI_PER_UNIT as i128,
            unit_price.cents() as i128,
        );
        Some(Quantity(milli as i64))
    }

    /// Converts to a float for the backend boundary only.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / MILLI_PER_UNIT as f64
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

/// Whole quantities print without decimals, fractional ones with three.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.whole_units())
        } else {
            let sign = if self.0 < 0 { "-" } else { "" };
            let abs = self.0.abs();
            write!(
                f,
                "{}{}.{:03}",
                sign,
                abs / MILLI_PER_UNIT,
                abs % MILLI_PER_UNIT
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_and_milli() {
        let q = Quantity::from_units(3);
        assert_eq!(q.milli(), 3000);
        assert_eq!(q.whole_units(), 3);
        assert!(q.is_whole());
        assert!(!Quantity::from_milli(250).is_whole());
    }

    #[test]
    fn test_from_amount_rounds_to_three_decimals() {
        // $100.00 at $3.00/kg = 33.3333 kg → 33.333
        let qty = Quantity::from_amount(Money::from_units(100), Money::from_units(3)).unwrap();
        assert_eq!(qty.milli(), 33_333);

        // $200.00 at $3.00/kg = 66.6666 kg → 66.667
        let qty = Quantity::from_amount(Money::from_units(200), Money::from_units(3)).unwrap();
        assert_eq!(qty.milli(), 66_667);
    }

    #[test]
    fn test_from_amount_rejects_free_products() {
        assert_eq!(Quantity::from_amount(Money::from_units(10), Money::zero()), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_units(3).to_string(), "3");
        assert_eq!(Quantity::from_milli(250).to_string(), "0.250");
        assert_eq!(Quantity::from_milli(1_005).to_string(), "1.005");
    }
}
