//! # Mostrador Engine
//!
//! The asynchronous half of the checkout: backend client, catalog mirror,
//! cart actor, input producers, submission, printing, and the session that
//! ties their lifetimes together.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CheckoutSession                                 │
//! │                                                                         │
//! │   ┌─────────────────┐        ┌─────────────────┐                        │
//! │   │ CatalogMirror   │◄───────│ InputReconciler │─────┐                  │
//! │   │ (RwLock table)  │        │ manual / scan / │     │ CartCommand      │
//! │   └────────┬────────┘        │ scale           │     ▼                  │
//! │            │                 └─────────────────┘  ┌──────────────┐      │
//! │            │ known ids                            │  CartActor   │      │
//! │            ▼                                      └──────┬───────┘      │
//! │   ┌─────────────────┐   snapshot                         │ CartView     │
//! │   │ CheckoutSubmitter│◄─────────────────────────────────-┘              │
//! │   │ busy flag       │──► Backend::submit ──► PrintPipeline               │
//! │   └─────────────────┘                                                   │
//! │                                                                         │
//! │   Notices ──► CheckoutEventEmitter (frontend)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`]: TOML + environment configuration
//! - [`backend`]: REST client trait and reqwest implementation
//! - [`wire`]: backend JSON shapes and their conversion to domain types
//! - [`catalog`]: catalog mirror and refresh logic
//! - [`cart`]: single-writer cart actor
//! - [`input`]: manual picker, scanner buffer, scale events
//! - [`form`]: payment panel, document kind, surcharge toggles
//! - [`checkout`]: submission with busy flag
//! - [`print`]: render, save, print, retry
//! - [`shortcuts`]: F1–F5 presets
//! - [`session`]: mount / shutdown of everything above
//! - [`notice`]: user-visible notices
//! - [`error`]: engine error type

pub mod backend;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod form;
pub mod input;
pub mod notice;
pub mod print;
pub mod session;
pub mod shortcuts;
pub mod wire;

#[cfg(test)]
mod fake;

pub use backend::{Backend, HttpBackend};
pub use cart::{CartActor, CartHandle, CartView};
pub use catalog::{CatalogMirror, CatalogSyncState};
pub use checkout::{CheckoutSubmitter, SubmitOutcome};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use form::CheckoutForm;
pub use input::{InputReconciler, ManualSelection, ScanOutcome, ScannerBuffer};
pub use notice::{ChannelEmitter, CheckoutEventEmitter, NoOpEmitter, Notice};
pub use print::{PrintFailure, PrintJob, PrintPipeline, PrintReceipt};
pub use session::CheckoutSession;
pub use shortcuts::Shortcut;
pub use wire::ScaleEvent;
