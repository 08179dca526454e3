//! # Document Type Resolution
//!
//! Maps the requested document kind and client tax id to the concrete
//! subtype submitted to the backend.
//!
//! ```text
//! requested     tax id                 subtype
//! ─────────     ──────                 ───────
//! factura       11 digits        ──►   factura_a
//! factura       absent/malformed ──►   factura_b
//! comprobante   (any)            ──►   recibo
//! remito        (any)            ──►   remito
//! presupuesto   (any)            ──►   presupuesto
//! ```
//!
//! Large final-consumer sales need a valid CUIT before resolution runs at
//! all. See [`require_tax_id_for_large_sale`].

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{ClientContext, DocumentKind, DocumentSubtype};
use crate::validation::{is_valid_tax_id, validate_tax_id};
use crate::TAX_ID_THRESHOLD;

/// Resolves the document subtype.
///
/// ## Example
/// ```rust
/// use mostrador_core::document::resolve_subtype;
/// use mostrador_core::{DocumentKind, DocumentSubtype};
///
/// assert_eq!(resolve_subtype(DocumentKind::Factura, Some("20304050607")), DocumentSubtype::FacturaA);
/// assert_eq!(resolve_subtype(DocumentKind::Factura, Some("")), DocumentSubtype::FacturaB);
/// assert_eq!(resolve_subtype(DocumentKind::Comprobante, None), DocumentSubtype::Recibo);
/// ```
pub fn resolve_subtype(kind: DocumentKind, tax_id: Option<&str>) -> DocumentSubtype {
    match kind {
        DocumentKind::Factura => {
            if tax_id.map(is_valid_tax_id).unwrap_or(false) {
                DocumentSubtype::FacturaA
            } else {
                DocumentSubtype::FacturaB
            }
        }
        DocumentKind::Comprobante => DocumentSubtype::Recibo,
        DocumentKind::Remito => DocumentSubtype::Remito,
        DocumentKind::Presupuesto => DocumentSubtype::Presupuesto,
    }
}

/// Final-consumer sales above TAX_ID_THRESHOLD need a valid CUIT.
///
/// Fails with a field-level error on `tax_id`. Registered clients and sales
/// at or below the threshold always pass.
pub fn require_tax_id_for_large_sale(client: &ClientContext, net: Money) -> CoreResult<()> {
    if !client.is_final_consumer() || net <= TAX_ID_THRESHOLD {
        return Ok(());
    }
    validate_tax_id(client.resolved_tax_id().unwrap_or(""))?;
    Ok(())
}

/// Enforces the tax id rule, then resolves.
pub fn resolve_document(
    kind: DocumentKind,
    client: &ClientContext,
    net: Money,
) -> CoreResult<DocumentSubtype> {
    require_tax_id_for_large_sale(client, net)?;
    Ok(resolve_subtype(kind, client.resolved_tax_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ValidationError};
    use crate::types::RegisteredClient;

    fn consumer(tax_id: &str) -> ClientContext {
        ClientContext::FinalConsumer {
            tax_id: Some(tax_id.to_string()),
        }
    }

    #[test]
    fn test_resolve_subtype() {
        assert_eq!(resolve_subtype(DocumentKind::Factura, Some("20304050607")), DocumentSubtype::FacturaA);
        assert_eq!(resolve_subtype(DocumentKind::Factura, Some("20-30405060-7")), DocumentSubtype::FacturaA);
        assert_eq!(resolve_subtype(DocumentKind::Factura, Some("2030")), DocumentSubtype::FacturaB);
        assert_eq!(resolve_subtype(DocumentKind::Factura, None), DocumentSubtype::FacturaB);
        assert_eq!(resolve_subtype(DocumentKind::Comprobante, Some("20304050607")), DocumentSubtype::Recibo);
        assert_eq!(resolve_subtype(DocumentKind::Remito, None), DocumentSubtype::Remito);
        assert_eq!(resolve_subtype(DocumentKind::Presupuesto, None), DocumentSubtype::Presupuesto);
    }

    #[test]
    fn test_large_final_consumer_sale_needs_tax_id() {
        let net = Money::from_units(250_000);

        let err = require_tax_id_for_large_sale(&consumer(""), net).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
        assert_eq!(err.field(), Some("tax_id"));

        let err = require_tax_id_for_large_sale(&consumer("123"), net).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidFormat { .. })));

        assert!(require_tax_id_for_large_sale(&consumer("20304050607"), net).is_ok());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(require_tax_id_for_large_sale(&consumer(""), TAX_ID_THRESHOLD).is_ok());
        assert!(require_tax_id_for_large_sale(&consumer(""), TAX_ID_THRESHOLD + Money::from_cents(1)).is_err());
    }

    #[test]
    fn test_registered_clients_skip_the_rule() {
        let client = ClientContext::Registered {
            client: Some(RegisteredClient {
                id: 3,
                name: "Kiosco".to_string(),
                tax_id: None,
                wholesale: false,
            }),
        };
        assert!(require_tax_id_for_large_sale(&client, Money::from_units(900_000)).is_ok());
    }

    #[test]
    fn test_resolve_document_uses_client_tax_id() {
        let subtype = resolve_document(DocumentKind::Factura, &consumer("20304050607"), Money::from_units(10)).unwrap();
        assert_eq!(subtype, DocumentSubtype::FacturaA);

        let blocked = resolve_document(DocumentKind::Factura, &consumer(""), Money::from_units(250_000));
        assert!(blocked.is_err());
    }
}
