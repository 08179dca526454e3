//! # Checkout Form
//!
//! Everything checkout reads besides the cart: the payment panel, the
//! requested document, the surcharge toggles and observations. Reset
//! together with the cart after a successful submission.

use mostrador_core::{
    Cart, CartTotals, CheckoutRequest, CoreResult, DocumentKind, PaymentMethod, PaymentReconciler,
    PaymentState, SurchargeSettings, Totals,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutForm {
    /// Set when the cashier opened the payment panel.
    pub panel_acknowledged: bool,
    pub payment: PaymentReconciler,
    pub kind: DocumentKind,
    pub surcharges: SurchargeSettings,
    pub observations: String,
    /// Surcharge rates with toggles off, restored on reset.
    initial_surcharges: SurchargeSettings,
}

impl CheckoutForm {
    pub fn new(surcharges: SurchargeSettings) -> Self {
        CheckoutForm {
            panel_acknowledged: false,
            payment: PaymentReconciler::new(),
            kind: DocumentKind::default(),
            surcharges,
            observations: String::new(),
            initial_surcharges: surcharges,
        }
    }

    pub fn open_payment_panel(&mut self) {
        self.panel_acknowledged = true;
    }

    pub fn close_payment_panel(&mut self) {
        self.panel_acknowledged = false;
    }

    pub fn toggle_surcharge(&mut self, method: PaymentMethod, enabled: bool) {
        self.surcharges.set_enabled(method, enabled);
    }

    /// Totals with the surcharge of the selected method.
    pub fn totals(&self, cart: &CartTotals) -> Totals {
        cart.with_method(self.payment.active_method(), &self.surcharges)
    }

    /// Presets a single-method payment and document kind.
    ///
    /// Cash without a typed amount pays exactly the final total.
    pub fn apply_preset(
        &mut self,
        kind: DocumentKind,
        method: PaymentMethod,
        cart: &CartTotals,
    ) -> CoreResult<()> {
        self.payment.select_single(method);
        if let PaymentState::Single {
            method: PaymentMethod::Cash,
            amount_paid: None,
        } = self.payment.state()
        {
            let total = self.totals(cart).final_total;
            self.payment.set_amount_paid(total)?;
        }
        self.panel_acknowledged = true;
        self.kind = kind;
        Ok(())
    }

    pub fn request<'a>(&'a self, cart: &'a Cart) -> CheckoutRequest<'a> {
        CheckoutRequest {
            cart,
            payment: &self.payment,
            panel_acknowledged: self.panel_acknowledged,
            kind: self.kind,
            surcharges: &self.surcharges,
            observations: Some(self.observations.as_str()),
        }
    }

    pub fn reset(&mut self) {
        *self = CheckoutForm::new(self.initial_surcharges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::{Money, Percent, Surcharge};

    fn totals(units: i64) -> CartTotals {
        CartTotals {
            line_count: 1,
            list_total: Money::from_units(units),
            subtotal: Money::from_units(units),
            net: Money::from_units(units),
        }
    }

    fn surcharges() -> SurchargeSettings {
        SurchargeSettings {
            transfer: Surcharge::new(Percent::from_bps(500), false),
            bank_pos: Surcharge::new(Percent::from_bps(1000), false),
        }
    }

    #[test]
    fn test_cash_preset_pays_final_total() {
        let mut form = CheckoutForm::new(surcharges());
        form.apply_preset(DocumentKind::Factura, PaymentMethod::Cash, &totals(300))
            .unwrap();
        assert!(form.panel_acknowledged);
        assert_eq!(form.kind, DocumentKind::Factura);
        assert_eq!(
            form.payment.state(),
            &PaymentState::Single {
                method: PaymentMethod::Cash,
                amount_paid: Some(Money::from_units(300)),
            }
        );
    }

    #[test]
    fn test_cash_preset_keeps_typed_amount() {
        let mut form = CheckoutForm::new(surcharges());
        form.payment.select_single(PaymentMethod::Cash);
        form.payment.set_amount_paid(Money::from_units(500)).unwrap();
        form.apply_preset(DocumentKind::Comprobante, PaymentMethod::Cash, &totals(300))
            .unwrap();
        assert_eq!(
            form.payment.validate(Money::from_units(300)).unwrap().change,
            Money::from_units(200)
        );
    }

    #[test]
    fn test_reset_restores_toggles() {
        let mut form = CheckoutForm::new(surcharges());
        form.toggle_surcharge(PaymentMethod::Transfer, true);
        form.payment.select_single(PaymentMethod::Transfer);
        assert_eq!(form.totals(&totals(1000)).final_total, Money::from_units(1050));

        form.observations = "sin bolsa".into();
        form.reset();
        assert!(!form.surcharges.transfer.enabled);
        assert_eq!(form.surcharges.transfer.rate.bps(), 500);
        assert!(form.observations.is_empty());
        assert!(!form.panel_acknowledged);
    }
}
