//! # Notices
//!
//! Non-blocking messages for the cashier: catalog refreshes, appended
//! lines, rejected inputs, submission and print outcomes.
//!
//! The engine never waits on a notice being shown. Frontends implement
//! [`CheckoutEventEmitter`]; the terminal uses [`ChannelEmitter`].

use serde::Serialize;
use tokio::sync::mpsc;

use mostrador_core::LineSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    CatalogUpdated { version: i64 },
    CatalogRefreshFailed { message: String },
    LineAppended { source: LineSource, name: String },
    InputRejected { source: LineSource, reason: String },
    TransactionSubmitted { id: i64, message: String },
    SubmissionFailed { message: String },
    PrintFailed { message: String },
}

impl Notice {
    /// Warnings and failures, as opposed to confirmations.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::CatalogRefreshFailed { .. }
                | Notice::InputRejected { .. }
                | Notice::SubmissionFailed { .. }
                | Notice::PrintFailed { .. }
        )
    }
}

/// Receives notices from the engine.
pub trait CheckoutEventEmitter: Send + Sync {
    fn emit(&self, notice: Notice);
}

/// Drops every notice.
pub struct NoOpEmitter;

impl CheckoutEventEmitter for NoOpEmitter {
    fn emit(&self, _notice: Notice) {}
}

/// Forwards notices into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEmitter { tx }, rx)
    }
}

impl CheckoutEventEmitter for ChannelEmitter {
    fn emit(&self, notice: Notice) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_emitter_forwards() {
        let (emitter, mut rx) = ChannelEmitter::new();
        emitter.emit(Notice::CatalogUpdated { version: 3 });
        assert_eq!(rx.try_recv().unwrap(), Notice::CatalogUpdated { version: 3 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_emitter_survives_dropped_receiver() {
        let (emitter, rx) = ChannelEmitter::new();
        drop(rx);
        emitter.emit(Notice::PrintFailed {
            message: "sin papel".into(),
        });
    }

    #[test]
    fn test_warning_classification() {
        assert!(Notice::SubmissionFailed { message: "x".into() }.is_warning());
        assert!(!Notice::TransactionSubmitted {
            id: 1,
            message: "ok".into()
        }
        .is_warning());
    }
}
