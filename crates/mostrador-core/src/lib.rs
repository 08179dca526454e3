//! # mostrador-core: Pure Checkout Logic for Mostrador
//!
//! This crate is the **heart** of the checkout engine. It contains the cart,
//! pricing, payment and document rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mostrador Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Checkout Screen                              │   │
//! │  │   Picker ──► Scanner field ──► Payment panel ──► Submit        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 mostrador-engine (async)                        │   │
//! │  │   catalog mirror, cart actor, scale poll, submit, print         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mostrador-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐  │   │
//! │  │  │  money  │ │  cart   │ │ pricing │ │ payment │ │ document │  │   │
//! │  │  │quantity │ │CartLine │ │discounts│ │ single/ │ │ factura  │  │   │
//! │  │  │ Percent │ │  Cart   │ │surcharge│ │  split  │ │ a / b    │  │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO TIMERS • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (cents)
//! - [`quantity`] - Quantities in thousandths of a unit (bulk sales)
//! - [`types`] - Domain types (Product, ClientContext, PaymentMethod, ...)
//! - [`pricing`] - Unit-of-sale classification, bulk linking, discounts
//! - [`cart`] - Cart and CartLine
//! - [`payment`] - Single and split payment reconciliation
//! - [`document`] - Requested kind to concrete document subtype
//! - [`checkout`] - Ordered pre-submit validation
//! - [`transaction`] - The finalized transaction handed to the backend
//! - [`error`] - Domain error types
//! - [`validation`] - Field validators
//!
//! ## Example Usage
//!
//! ```rust
//! use mostrador_core::money::Money;
//! use mostrador_core::pricing::line_total;
//! use mostrador_core::types::Percent;
//!
//! let base = Money::from_cents(10_000); // $100.00
//! let total = line_total(base, Percent::from_bps(1_000), Money::from_cents(500));
//!
//! // 100.00 - 10% - 5.00 = 85.00
//! assert_eq!(total.cents(), 8_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod document;
pub mod error;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod quantity;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals, LineRequest, PriceSnapshot};
pub use checkout::{prepare_transaction, CheckoutRequest};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{PaymentEntry, PaymentReconciler, PaymentState, PaymentSummary};
pub use pricing::{Surcharge, SurchargeSettings, Totals};
pub use quantity::Quantity;
pub use transaction::{Transaction, TransactionLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts (a stuck scanner key, a looping scale bridge).
pub const MAX_CART_LINES: usize = 100;

/// Maximum unit-mode quantity of a single line.
pub const MAX_UNIT_QUANTITY: i64 = 9_999;

/// Tolerance for split payment reconciliation: one currency unit.
pub const SPLIT_TOLERANCE: Money = Money::from_cents(100);

/// Net total above which a final-consumer sale needs a tax id (CUIT).
pub const TAX_ID_THRESHOLD: Money = Money::from_cents(200_000 * 100);
