//! # Console Error Type
//!
//! Everything a console command can fail with, reduced to one line of text
//! for the cashier.
//!
//! ```text
//! typed line ──parse──► ConsoleError::Parse / Usage
//!      │
//!      ▼
//! Console::execute ──► EngineError ──► user_message()
//!                  └─► CoreError   ──► field + message
//! ```

use mostrador_core::{CoreError, ValidationError};
use mostrador_engine::EngineError;
use thiserror::Error;

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Unknown command word.
    #[error("Unknown command: {0} (type :help)")]
    UnknownCommand(String),

    /// Known command, wrong arguments.
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Not a number: {0}")]
    NotANumber(String),

    #[error("No line number {0} in the cart")]
    NoSuchLine(usize),

    #[error("Nothing to retry")]
    NothingToRetry,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConsoleError {
    /// The line printed for the cashier.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Engine(EngineError::Checkout(e)) | ConsoleError::Core(e) => match e.field() {
                Some(field) => format!("[{}] {}", field, e),
                None => e.to_string(),
            },
            ConsoleError::Engine(e) => e.user_message(),
            ConsoleError::Validation(e) => format!("[{}] {}", e.field(), e),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_names_the_field() {
        let err = ConsoleError::from(CoreError::ClientNotSelected);
        assert_eq!(err.user_message(), "[client] Select a client for this sale");

        let err = ConsoleError::from(EngineError::ServerRejected {
            status: 422,
            message: "Stock insuficiente".into(),
        });
        assert_eq!(err.user_message(), "Stock insuficiente");
    }
}
