//! # Payment Reconciler
//!
//! Single or split payment entries, validated against the final total.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐  select_single(m)  ┌──────────────────────────────┐       │
//! │   │  Unset  │ ─────────────────► │ Single { method, amount? }   │       │
//! │   └─────────┘                    └──────────────────────────────┘       │
//! │        │                              ▲                 │               │
//! │        │ enable_split()  select_single│    enable_split │               │
//! │        ▼                              │                 ▼               │
//! │   ┌──────────────────────────────────────────────────────────┐          │
//! │   │ Split { entries: [(method, amount), ...] }               │          │
//! │   └──────────────────────────────────────────────────────────┘          │
//! │                                                                         │
//! │   Switching mode discards whatever the other mode had entered.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Acceptance
//! - Single cash: `amount_paid ≥ final`, change = `amount_paid − final`
//! - Single non-cash: the method pays exactly `final`
//! - Split: `|Σ amounts − final| ≤ SPLIT_TOLERANCE`, no change computed

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::SPLIT_TOLERANCE;

// =============================================================================
// Types
// =============================================================================

/// One method/amount pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentEntry {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// Where the payment panel currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaymentState {
    Unset,
    Single {
        method: PaymentMethod,
        /// Cash tendered. Ignored for non-cash methods.
        amount_paid: Option<Money>,
    },
    Split {
        entries: Vec<PaymentEntry>,
    },
}

impl Default for PaymentState {
    fn default() -> Self {
        PaymentState::Unset
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSummary {
    /// What is sent to the backend.
    pub entries: Vec<PaymentEntry>,
    pub split: bool,
    /// Change to hand back (cash only).
    pub change: Money,
}

impl PaymentSummary {
    /// The single method, when the payment is not split.
    pub fn single_method(&self) -> Option<PaymentMethod> {
        match (self.split, self.entries.first()) {
            (false, Some(entry)) => Some(entry.method),
            _ => None,
        }
    }
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentReconciler {
    state: PaymentState,
}

impl PaymentReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    /// The method that drives the surcharge. Split payments have none.
    pub fn active_method(&self) -> Option<PaymentMethod> {
        match &self.state {
            PaymentState::Single { method, .. } => Some(*method),
            PaymentState::Unset | PaymentState::Split { .. } => None,
        }
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        matches!(self.state, PaymentState::Split { .. })
    }

    /// Selects a single method.
    ///
    /// Re-selecting the current method keeps the typed amount; any other
    /// transition starts from a blank amount.
    pub fn select_single(&mut self, method: PaymentMethod) {
        let amount_paid = match &self.state {
            PaymentState::Single {
                method: current,
                amount_paid,
            } if *current == method => *amount_paid,
            _ => None,
        };
        self.state = PaymentState::Single {
            method,
            amount_paid,
        };
    }

    /// Records the cash tendered.
    pub fn set_amount_paid(&mut self, amount: Money) -> CoreResult<()> {
        if amount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "amount_paid".to_string(),
            }
            .into());
        }
        match &mut self.state {
            PaymentState::Single { amount_paid, .. } => {
                *amount_paid = Some(amount);
                Ok(())
            }
            PaymentState::Unset | PaymentState::Split { .. } => Err(CoreError::PaymentNotSelected),
        }
    }

    /// Switches to split mode with no entries.
    pub fn enable_split(&mut self) {
        if !self.is_split() {
            self.state = PaymentState::Split {
                entries: Vec::new(),
            };
        }
    }

    /// Appends a split entry and returns its index.
    ///
    /// Existing entries are left exactly as they were.
    pub fn add_entry(&mut self, method: PaymentMethod, amount: Money) -> CoreResult<usize> {
        validate_entry_amount(amount)?;
        let entries = self.entries_mut()?;
        entries.push(PaymentEntry { method, amount });
        Ok(entries.len() - 1)
    }

    pub fn update_entry(&mut self, index: usize, amount: Money) -> CoreResult<()> {
        validate_entry_amount(amount)?;
        let entries = self.entries_mut()?;
        let len = entries.len();
        let entry = entries.get_mut(index).ok_or_else(|| out_of_range(len))?;
        entry.amount = amount;
        Ok(())
    }

    pub fn remove_entry(&mut self, index: usize) -> CoreResult<PaymentEntry> {
        let entries = self.entries_mut()?;
        if index >= entries.len() {
            return Err(out_of_range(entries.len()));
        }
        Ok(entries.remove(index))
    }

    fn entries_mut(&mut self) -> CoreResult<&mut Vec<PaymentEntry>> {
        match &mut self.state {
            PaymentState::Split { entries } => Ok(entries),
            PaymentState::Unset | PaymentState::Single { .. } => Err(CoreError::PaymentNotSelected),
        }
    }

    /// Validates the payment against the final total.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::payment::PaymentReconciler;
    /// use mostrador_core::{CoreError, PaymentMethod};
    ///
    /// let mut payment = PaymentReconciler::new();
    /// payment.enable_split();
    /// payment.add_entry(PaymentMethod::Cash, Money::from_units(600)).unwrap();
    /// payment.add_entry(PaymentMethod::Transfer, Money::from_units(350)).unwrap();
    ///
    /// let err = payment.validate(Money::from_units(1000)).unwrap_err();
    /// assert_eq!(err, CoreError::Reconciliation { difference: Money::from_units(-50) });
    /// ```
    pub fn validate(&self, final_total: Money) -> CoreResult<PaymentSummary> {
        match &self.state {
            PaymentState::Unset => Err(CoreError::PaymentNotSelected),

            PaymentState::Single {
                method: PaymentMethod::Cash,
                amount_paid,
            } => {
                let paid = amount_paid.unwrap_or_default();
                if paid < final_total {
                    return Err(CoreError::CashShortfall {
                        paid,
                        total: final_total,
                    });
                }
                Ok(PaymentSummary {
                    entries: vec![PaymentEntry {
                        method: PaymentMethod::Cash,
                        amount: final_total,
                    }],
                    split: false,
                    change: paid - final_total,
                })
            }

            PaymentState::Single { method, .. } => Ok(PaymentSummary {
                entries: vec![PaymentEntry {
                    method: *method,
                    amount: final_total,
                }],
                split: false,
                change: Money::zero(),
            }),

            PaymentState::Split { entries } => {
                let paid: Money = entries.iter().map(|e| e.amount).sum();
                let difference = paid - final_total;
                if difference.abs() > SPLIT_TOLERANCE {
                    return Err(CoreError::Reconciliation { difference });
                }
                Ok(PaymentSummary {
                    entries: entries.clone(),
                    split: true,
                    change: Money::zero(),
                })
            }
        }
    }

    /// Back to `Unset`.
    pub fn reset(&mut self) {
        self.state = PaymentState::Unset;
    }
}

fn validate_entry_amount(amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "split_payments".to_string(),
        }
        .into());
    }
    Ok(())
}

fn out_of_range(len: usize) -> CoreError {
    ValidationError::OutOfRange {
        field: "split_payments".to_string(),
        min: 0,
        max: len.saturating_sub(1) as i64,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
