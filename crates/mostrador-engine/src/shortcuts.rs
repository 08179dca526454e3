//! # Keyboard Shortcuts
//!
//! Fixed preset-and-submit combos of the checkout screen.
//!
//! ```text
//! ┌─────┬──────────────┬─────────────────┐
//! │ Key │ Document     │ Method          │
//! ├─────┼──────────────┼─────────────────┤
//! │ F1  │ Comprobante  │ Cash            │
//! │ F2  │ Factura      │ Cash            │
//! │ F3  │ Comprobante  │ Transfer        │
//! │ F4  │ Factura      │ BankPos         │
//! │ F5  │ Remito       │ CurrentAccount  │
//! └─────┴──────────────┴─────────────────┘
//! ```
//!
//! A shortcut only sets form state; submission goes through the same path
//! as a manual click.

use std::fmt;
use std::str::FromStr;

use mostrador_core::{DocumentKind, PaymentMethod, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl Shortcut {
    pub const ALL: [Shortcut; 5] = [
        Shortcut::F1,
        Shortcut::F2,
        Shortcut::F3,
        Shortcut::F4,
        Shortcut::F5,
    ];

    /// The document and method this key presets.
    pub fn preset(&self) -> (DocumentKind, PaymentMethod) {
        match self {
            Shortcut::F1 => (DocumentKind::Comprobante, PaymentMethod::Cash),
            Shortcut::F2 => (DocumentKind::Factura, PaymentMethod::Cash),
            Shortcut::F3 => (DocumentKind::Comprobante, PaymentMethod::Transfer),
            Shortcut::F4 => (DocumentKind::Factura, PaymentMethod::BankPos),
            Shortcut::F5 => (DocumentKind::Remito, PaymentMethod::CurrentAccount),
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, method) = self.preset();
        write!(f, "{:?}: {} / {}", self, kind.as_str(), method)
    }
}

impl FromStr for Shortcut {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "F1" => Ok(Shortcut::F1),
            "F2" => Ok(Shortcut::F2),
            "F3" => Ok(Shortcut::F3),
            "F4" => Ok(Shortcut::F4),
            "F5" => Ok(Shortcut::F5),
            _ => Err(ValidationError::NotAllowed {
                field: "shortcut".to_string(),
                allowed: ["F1", "F2", "F3", "F4", "F5"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(
            Shortcut::F4.preset(),
            (DocumentKind::Factura, PaymentMethod::BankPos)
        );
        assert_eq!(
            Shortcut::F5.preset(),
            (DocumentKind::Remito, PaymentMethod::CurrentAccount)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("f2".parse::<Shortcut>().unwrap(), Shortcut::F2);
        assert!("F9".parse::<Shortcut>().is_err());
        assert_eq!(Shortcut::F3.to_string(), "F3: comprobante / transferencia");
    }
}
