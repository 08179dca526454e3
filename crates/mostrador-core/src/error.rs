//! # Error Types
//!
//! Domain-specific error types for mostrador-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mostrador-core errors (this file)                                     │
//! │  ├── CoreError        - Checkout rule violations                       │
//! │  │   ├── Reconciliation     (split payment outside tolerance)          │
//! │  │   ├── UnresolvedLines    (cart line without a catalog product)      │
//! │  │   └── ...                                                           │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  mostrador-engine errors (separate crate)                              │
//! │  └── EngineError      - Network, server rejection, print, config       │
//! │                                                                         │
//! │  Every CoreError is raised before any network call is made.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (line, field, amounts)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Checkout rule violations.
///
/// All of these are correctable by the cashier and block submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The payment panel was never opened for this sale.
    #[error("Open the payment panel before submitting")]
    PaymentPanelClosed,

    /// Nothing to sell.
    #[error("The cart is empty")]
    EmptyCart,

    /// No payment method chosen yet.
    #[error("Select a payment method")]
    PaymentNotSelected,

    /// Cash tendered does not cover the total.
    #[error("Cash received {paid} does not cover the total {total}")]
    CashShortfall { paid: Money, total: Money },

    /// Split payments do not add up to the total.
    ///
    /// `difference` is signed: negative means the entries fall short,
    /// positive means they exceed the total.
    #[error("Split payments differ from the total by {difference}")]
    Reconciliation { difference: Money },

    /// Registered-client sale without a client.
    #[error("Select a client for this sale")]
    ClientNotSelected,

    /// Cart lines with no valid catalog product at submit time.
    #[error("Lines without a valid product: {}", lines.join(", "))]
    UnresolvedLines { lines: Vec<String> },

    /// A cart line id that does not exist.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Operation only valid for bulk-mode lines.
    #[error("Line {0} is not sold in bulk")]
    NotBulkLine(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// The input field the cashier has to fix, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::Validation(v) => Some(v.field()),
            CoreError::CashShortfall { .. } => Some("amount_paid"),
            CoreError::Reconciliation { .. } => Some("split_payments"),
            CoreError::ClientNotSelected => Some("client"),
            CoreError::PaymentNotSelected => Some("payment_method"),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Every variant names the offending `field` so the checkout screen can
/// highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required: {reason}")]
    Required { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed tax id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
