//! # Validation Module
//!
//! Field validators for checkout input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Backend boundary (mostrador-engine::wire)                    │
//! │  ├── Finite, non-negative prices and weights                           │
//! │  └── Malformed records rejected before reaching the cart               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Cart edits (THIS MODULE)                                     │
//! │  ├── Discount ranges, quantities, cart size                            │
//! │  └── Tax id format                                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Checkout (mostrador-core::checkout)                          │
//! │  └── Ordered, short-circuiting pre-submit rules                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::Percent;
use crate::MAX_CART_LINES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Digits in a CUIT.
pub const TAX_ID_DIGITS: usize = 11;

// =============================================================================
// Tax Id
// =============================================================================

/// Normalizes a tax id by dropping spaces and the usual hyphens.
///
/// `"20-30405060-7"` and `"20304050607"` are the same CUIT.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// True when the tax id is exactly 11 ASCII digits after normalization.
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::is_valid_tax_id;
///
/// assert!(is_valid_tax_id("20304050607"));
/// assert!(is_valid_tax_id("20-30405060-7"));
/// assert!(!is_valid_tax_id("2030405060"));
/// assert!(!is_valid_tax_id("2030405060X"));
/// ```
pub fn is_valid_tax_id(raw: &str) -> bool {
    let normalized = normalize_tax_id(raw);
    normalized.len() == TAX_ID_DIGITS && normalized.chars().all(|c| c.is_ascii_digit())
}

/// Validates a tax id and returns its normalized form.
pub fn validate_tax_id(raw: &str) -> ValidationResult<String> {
    let normalized = normalize_tax_id(raw);

    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "tax_id".to_string(),
            reason: "a CUIT is required".to_string(),
        });
    }

    if !is_valid_tax_id(&normalized) {
        return Err(ValidationError::InvalidFormat {
            field: "tax_id".to_string(),
            reason: format!("a CUIT has exactly {} digits", TAX_ID_DIGITS),
        });
    }

    Ok(normalized)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a percentage discount: 0% to 100%.
pub fn validate_discount_percent(field: &str, pct: Percent) -> ValidationResult<()> {
    if pct > Percent::full() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates a nominal (fixed amount) discount: must not be negative.
pub fn validate_nominal_discount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a price: zero is allowed (free items), negative is not.
pub fn validate_price(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a bulk-mode quantity: fractional, not negative.
pub fn validate_bulk_quantity(qty: Quantity) -> ValidationResult<()> {
    if qty.milli() < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before appending one more line.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }
    Ok(())
}

/// Validates a product search query.
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::OutOfRange {
            field: "query".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tax_id() {
        assert_eq!(validate_tax_id("20304050607").unwrap(), "20304050607");
        assert_eq!(validate_tax_id("20-30405060-7").unwrap(), "20304050607");

        let err = validate_tax_id("").unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
        assert_eq!(err.field(), "tax_id");

        let err = validate_tax_id("123").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
        assert!(validate_tax_id("203040506071").is_err());
        assert!(validate_tax_id("2030405060a").is_err());
    }

    #[test]
    fn test_validate_discount_percent() {
        assert!(validate_discount_percent("discount", Percent::zero()).is_ok());
        assert!(validate_discount_percent("discount", Percent::full()).is_ok());
        assert!(validate_discount_percent("discount", Percent::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_nominal_discount() {
        assert!(validate_nominal_discount("discount", Money::zero()).is_ok());
        assert!(validate_nominal_discount("discount", Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_bulk_quantity() {
        assert!(validate_bulk_quantity(Quantity::zero()).is_ok());
        assert!(validate_bulk_quantity(Quantity::from_milli(250)).is_ok());
        assert!(validate_bulk_quantity(Quantity::from_milli(-1)).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES).is_err());
    }
}
