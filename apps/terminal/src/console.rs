//! # Console Commands
//!
//! One typed line is one command. Plain text goes to the scanner field and
//! the Enter key is its terminator; lines starting with `:` drive the rest
//! of the checkout screen.
//!
//! ```text
//! 7790001234567        scanner input (code, or a name to search)
//! F1 .. F5             preset-and-submit shortcuts
//! :add 12 [qty]        manual pick
//! :amount 12 350       bulk pick by amount
//! :rm 2                remove cart line 2
//! :disc 10 [nominal]   global discount
//! :ldisc 2 10 [nom]    line discount
//! :cuit 20304050607    final-consumer tax id (:cuit alone clears it)
//! :pay cash [amount]   single payment
//! :split cash 600      add a split entry
//! :kind factura        requested document
//! :surcharge transfer on|off
//! :note text           observations
//! :submit  :retry  :cart  :status  :help  :quit
//! ```

use std::fmt::Write as _;
use std::str::FromStr;

use mostrador_core::{
    ClientContext, DocumentKind, Money, PaymentMethod, Percent, Quantity, ValidationError,
};
use mostrador_engine::{
    CheckoutSession, EngineError, ManualSelection, PrintFailure, PrintReceipt, ScanOutcome,
    ScannerBuffer, Shortcut,
};
use tracing::debug;

use crate::error::{ConsoleError, ConsoleResult};

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Scan(String),
    Shortcut(Shortcut),
    Add { id: i64, quantity: Option<Quantity> },
    Amount { id: i64, amount: Money },
    Remove(usize),
    Discount { pct: Percent, nominal: Money },
    LineDiscount { line: usize, pct: Percent, nominal: Money },
    TaxId(Option<String>),
    Pay { method: PaymentMethod, amount: Option<Money> },
    Split { method: PaymentMethod, amount: Money },
    Kind(DocumentKind),
    Surcharge { method: PaymentMethod, enabled: bool },
    Note(String),
    Submit,
    Retry,
    Clear,
    Show,
    Status,
    Help,
    Quit,
}

fn number<T: FromStr>(raw: &str) -> ConsoleResult<T> {
    raw.parse()
        .map_err(|_| ConsoleError::NotANumber(raw.to_string()))
}

fn non_negative(field: &str, raw: &str) -> ConsoleResult<f64> {
    let value: f64 = number(raw)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }
        .into());
    }
    Ok(value)
}

/// Typed decimal amount, e.g. `12.50`.
fn money(field: &str, raw: &str) -> ConsoleResult<Money> {
    Ok(Money::from_cents((non_negative(field, raw)? * 100.0).round() as i64))
}

/// Typed decimal quantity, e.g. `0.250`.
fn quantity(raw: &str) -> ConsoleResult<Quantity> {
    Ok(Quantity::from_milli((non_negative("quantity", raw)? * 1000.0).round() as i64))
}

fn percent(raw: &str) -> ConsoleResult<Percent> {
    Ok(Percent::from_percentage(non_negative("discount_pct", raw)?))
}

fn optional_money(field: &str, raw: Option<&&str>) -> ConsoleResult<Money> {
    raw.map(|r| money(field, r))
        .transpose()
        .map(Option::unwrap_or_default)
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if let Ok(shortcut) = line.parse::<Shortcut>() {
            return Ok(Command::Shortcut(shortcut));
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Scan(line.to_string()));
        };

        let (word, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        let args: Vec<&str> = tail.split_whitespace().collect();

        let cmd = match (word, args.as_slice()) {
            ("add", [id, qty @ ..]) if qty.len() <= 1 => Command::Add {
                id: number(id)?,
                quantity: qty.first().map(|q| quantity(q)).transpose()?,
            },
            ("add", _) => return Err(ConsoleError::Usage(":add <id> [quantity]")),

            ("amount", [id, amount]) => Command::Amount {
                id: number(id)?,
                amount: money("amount", amount)?,
            },
            ("amount", _) => return Err(ConsoleError::Usage(":amount <id> <amount>")),

            ("rm", [line]) => Command::Remove(number(line)?),
            ("rm", _) => return Err(ConsoleError::Usage(":rm <line>")),

            ("disc", [pct, nominal @ ..]) if nominal.len() <= 1 => Command::Discount {
                pct: percent(pct)?,
                nominal: optional_money("discount_nominal", nominal.first())?,
            },
            ("disc", _) => return Err(ConsoleError::Usage(":disc <pct> [nominal]")),

            ("ldisc", [line, pct, nominal @ ..]) if nominal.len() <= 1 => Command::LineDiscount {
                line: number(line)?,
                pct: percent(pct)?,
                nominal: optional_money("discount_nominal", nominal.first())?,
            },
            ("ldisc", _) => return Err(ConsoleError::Usage(":ldisc <line> <pct> [nominal]")),

            ("cuit", []) => Command::TaxId(None),
            ("cuit", [tax_id]) => Command::TaxId(Some(tax_id.to_string())),
            ("cuit", _) => return Err(ConsoleError::Usage(":cuit [tax id]")),

            ("pay", [method, amount @ ..]) if amount.len() <= 1 => Command::Pay {
                method: method.parse()?,
                amount: amount.first().map(|a| money("amount_paid", a)).transpose()?,
            },
            ("pay", _) => return Err(ConsoleError::Usage(":pay <method> [amount]")),

            ("split", [method, amount]) => Command::Split {
                method: method.parse()?,
                amount: money("split_payments", amount)?,
            },
            ("split", _) => return Err(ConsoleError::Usage(":split <method> <amount>")),

            ("kind", [kind]) => Command::Kind(kind.parse()?),
            ("kind", _) => {
                return Err(ConsoleError::Usage(":kind factura|comprobante|remito|presupuesto"))
            }

            ("surcharge", [method, "on"]) => Command::Surcharge {
                method: method.parse()?,
                enabled: true,
            },
            ("surcharge", [method, "off"]) => Command::Surcharge {
                method: method.parse()?,
                enabled: false,
            },
            ("surcharge", _) => return Err(ConsoleError::Usage(":surcharge <method> on|off")),

            ("note", _) => Command::Note(tail.trim().to_string()),
            ("submit", []) => Command::Submit,
            ("retry", []) => Command::Retry,
            ("clear", []) => Command::Clear,
            ("cart", []) => Command::Show,
            ("status", []) => Command::Status,
            ("help", []) => Command::Help,
            ("quit" | "q", []) => Command::Quit,
            (other, _) => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

// =============================================================================
// Console
// =============================================================================

pub enum Flow {
    Continue(String),
    Quit,
}

/// Drives one mounted checkout session from typed commands.
pub struct Console {
    session: CheckoutSession,
    scanner: ScannerBuffer,
    /// Last failed print job, kept for `:retry`.
    failed_print: Option<PrintFailure>,
}

impl Console {
    pub fn new(session: CheckoutSession) -> Self {
        Console {
            session,
            scanner: ScannerBuffer::new(),
            failed_print: None,
        }
    }

    pub async fn execute(&mut self, cmd: Command) -> ConsoleResult<Flow> {
        debug!(?cmd, "Console command");
        let out = match cmd {
            Command::Scan(text) => self.scan(&text).await?,
            Command::Shortcut(shortcut) => {
                let outcome = self.session.submitter().apply_shortcut(shortcut).await?;
                self.after_submit(outcome.response.id, outcome.print)
            }
            Command::Add { id, quantity } => {
                let mut selection = self.select(id).await?;
                if let Some(q) = quantity {
                    selection.set_quantity(q)?;
                }
                let line = self.session.input().add_manual(&selection).await?;
                format!("+ {} x{} = {}", line.name, line.quantity, line.total())
            }
            Command::Amount { id, amount } => {
                let mut selection = self.select(id).await?;
                selection.set_amount(amount)?;
                let line = self.session.input().add_manual(&selection).await?;
                format!("+ {} x{} = {}", line.name, line.quantity, line.total())
            }
            Command::Remove(index) => {
                let line_id = self.line_id(index)?;
                let line = self.session.cart().remove_line(&line_id).await?;
                format!("- {}", line.name)
            }
            Command::Discount { pct, nominal } => {
                self.session
                    .cart()
                    .set_global_discount(pct, nominal)
                    .await?;
                self.render_cart().await
            }
            Command::LineDiscount { line, pct, nominal } => {
                let line_id = self.line_id(line)?;
                self.session
                    .cart()
                    .set_line_discount(&line_id, pct, nominal)
                    .await?;
                self.render_cart().await
            }
            Command::TaxId(tax_id) => {
                self.session
                    .cart()
                    .set_client(ClientContext::FinalConsumer { tax_id })
                    .await?;
                "Client updated".to_string()
            }
            Command::Pay { method, amount } => {
                let mut form = self.session.form().lock().await;
                form.open_payment_panel();
                form.payment.select_single(method);
                if let Some(amount) = amount {
                    form.payment.set_amount_paid(amount)?;
                }
                format!("Payment: {}", method)
            }
            Command::Split { method, amount } => {
                let mut form = self.session.form().lock().await;
                form.open_payment_panel();
                form.payment.enable_split();
                let index = form.payment.add_entry(method, amount)?;
                format!("Split entry {}: {} {}", index + 1, method, amount)
            }
            Command::Kind(kind) => {
                self.session.form().lock().await.kind = kind;
                format!("Document: {}", kind.as_str())
            }
            Command::Surcharge { method, enabled } => {
                self.session.form().lock().await.toggle_surcharge(method, enabled);
                self.render_cart().await
            }
            Command::Note(text) => {
                self.session.form().lock().await.observations = text;
                "Observations updated".to_string()
            }
            Command::Submit => {
                let outcome = self.session.submitter().submit().await?;
                self.after_submit(outcome.response.id, outcome.print)
            }
            Command::Retry => {
                let failure = self.failed_print.take().ok_or(ConsoleError::NothingToRetry)?;
                match self.session.submitter().retry_print(failure).await {
                    Ok(receipt) => format!("Saved to {}", receipt.saved_to.display()),
                    Err(failure) => {
                        let message = failure.to_string();
                        self.failed_print = Some(failure);
                        message
                    }
                }
            }
            Command::Clear => {
                self.session.cart().reset().await?;
                self.session.form().lock().await.reset();
                "Sale cancelled".to_string()
            }
            Command::Show => self.render_cart().await,
            Command::Status => {
                let state = self.session.catalog().sync_state().await;
                format!(
                    "Catalog: {} products, version {}, {}",
                    self.session.catalog().len().await,
                    state.last_version,
                    if state.stale { "stale" } else { "up to date" }
                )
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Flow::Quit),
        };
        Ok(Flow::Continue(out))
    }

    pub async fn shutdown(self) {
        self.session.shutdown().await;
    }

    async fn scan(&mut self, text: &str) -> ConsoleResult<String> {
        self.scanner.clear();
        self.scanner.push_str(text);
        let outcome = self.session.input().terminate_scanner(&mut self.scanner).await?;
        let out = match outcome {
            ScanOutcome::Ignore => String::new(),
            ScanOutcome::Scan(code) => format!("Scanned {}", code),
            ScanOutcome::Search(query) => {
                let mut out = String::new();
                for p in self.session.catalog().search(&query).await? {
                    let _ = writeln!(out, "  [{}] {} {}", p.id, p.name, p.retail_price);
                }
                out
            }
        };
        Ok(out)
    }

    async fn select(&self, id: i64) -> ConsoleResult<ManualSelection> {
        let product = self
            .session
            .catalog()
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("product {}", id)))?;
        Ok(self.session.input().select(product))
    }

    /// Cart line id for a 1-based display index.
    fn line_id(&self, index: usize) -> ConsoleResult<String> {
        let view = self.session.cart().view();
        index
            .checked_sub(1)
            .and_then(|i| view.cart.lines.get(i))
            .map(|line| line.line_id.clone())
            .ok_or(ConsoleError::NoSuchLine(index))
    }

    fn after_submit(&mut self, id: i64, print: Result<PrintReceipt, PrintFailure>) -> String {
        match print {
            Ok(receipt) => format!("Transaction {} saved to {}", id, receipt.saved_to.display()),
            Err(failure) => {
                let message = format!("Transaction {} submitted; {} (:retry)", id, failure);
                self.failed_print = Some(failure);
                message
            }
        }
    }

    async fn render_cart(&self) -> String {
        let view = self.session.cart().view();
        let form = self.session.form().lock().await;
        let totals = form.totals(&view.totals);

        let mut out = String::new();
        for (i, line) in view.cart.lines.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3} {:<30} {:>9} x {:<9} {:>12}",
                i + 1,
                line.name,
                line.unit_price.to_string(),
                line.quantity.to_string(),
                line.total().to_string()
            );
        }
        let _ = writeln!(out, "    Subtotal  {:>12}", totals.subtotal.to_string());
        let _ = writeln!(out, "    Net       {:>12}", totals.net.to_string());
        if !totals.surcharge.is_zero() {
            let _ = writeln!(out, "    Surcharge {:>12}", totals.surcharge.to_string());
        }
        let _ = write!(out, "    TOTAL     {:>12}", totals.final_total.to_string());
        out
    }
}

const HELP: &str = "\
text                 scan a code, or search by name (3+ chars)
F1..F5               preset and submit
:add <id> [qty]      add a product
:amount <id> <amt>   add a bulk product by amount
:rm <n>              remove line n
:disc <pct> [nom]    global discount
:ldisc <n> <pct> [nom] line discount
:cuit [tax id]       final-consumer tax id
:pay <method> [amt]  single payment (efectivo, transferencia, bancario, cuenta_corriente)
:split <method> <amt> add a split entry
:kind <kind>         factura, comprobante, remito, presupuesto
:surcharge <method> on|off
:note <text>         observations
:clear               cancel the sale in progress
:submit :retry :cart :status :quit";

// =============================================================================
// Unit Tests
// =============================================================================
