//! # Mostrador Terminal
//!
//! Console front end of the checkout engine.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `mostrador.toml` (or defaults) and apply environment overrides
//! 3. Build the HTTP backend and the notice channel
//! 4. Mount the checkout session (catalog load, timers, cart actor)
//! 5. Read commands from stdin until `:quit` or end of input
//! 6. Unmount the session, cancelling every timer

mod console;
mod error;

use std::sync::Arc;

use mostrador_engine::{ChannelEmitter, CheckoutSession, EngineConfig, HttpBackend, Notice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::console::{Command, Console, Flow};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = EngineConfig::load_or_default(None);
    config.validate()?;

    let backend = Arc::new(HttpBackend::new(&config.backend.base_url)?);
    let (emitter, notices) = ChannelEmitter::new();
    let notice_printer = tokio::spawn(print_notices(notices));

    let session = CheckoutSession::mount(&config, backend, Arc::new(emitter)).await?;
    info!("Checkout ready, type :help for commands");

    let mut console = Console::new(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("! {}", e.user_message());
                continue;
            }
        };
        match console.execute(cmd).await {
            Ok(Flow::Continue(out)) if !out.is_empty() => println!("{}", out),
            Ok(Flow::Continue(_)) => {}
            Ok(Flow::Quit) => break,
            Err(e) => {
                error!(error = %e, "Command failed");
                println!("! {}", e.user_message());
            }
        }
    }

    console.shutdown().await;
    notice_printer.abort();
    info!("Checkout closed");
    Ok(())
}

/// Prints engine notices as they arrive.
async fn print_notices(mut rx: UnboundedReceiver<Notice>) {
    while let Some(notice) = rx.recv().await {
        let text = match &notice {
            Notice::CatalogUpdated { version } => format!("Catalog updated (version {})", version),
            Notice::CatalogRefreshFailed { message } => format!("Catalog may be out of date: {}", message),
            Notice::LineAppended { source, name } => format!("[{}] + {}", source, name),
            Notice::InputRejected { source, reason } => format!("[{}] {}", source, reason),
            Notice::TransactionSubmitted { id, message } => format!("#{} {}", id, message),
            Notice::SubmissionFailed { message } => message.clone(),
            Notice::PrintFailed { message } => message.clone(),
        };
        let marker = if notice.is_warning() { '!' } else { '*' };
        println!("{} {}", marker, text);
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=mostrador_engine=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
