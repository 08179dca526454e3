//! # Engine Error Types
//!
//! Error types for everything that leaves the process: configuration files,
//! the backend, the printer.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Network      │  │      Backend            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  ServerRejected         │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  NotFound               │ │
//! │  │  ConfigLoad/Save│  │                 │  │  InvalidResponse        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Checkout     │  │     Print       │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Checkout(Core) │  │  PrintFailed    │  │  ShuttingDown           │ │
//! │  │  Busy           │  │  Io             │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use mostrador_core::CoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Shown to the cashier for anything that is not a server message.
pub const CONNECTIVITY_MESSAGE: &str =
    "Could not reach the server. Check the connection and try again.";

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// The request could not be sent or the response not received.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// Request sent, non-success response. `message` is the server's own text.
    #[error("Server rejected the request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Checkout Errors
    // =========================================================================
    /// Blocking client-side rule; never reaches the network.
    #[error(transparent)]
    Checkout(#[from] CoreError),

    /// A submission is already running.
    #[error("A submission is already in progress")]
    Busy,

    // =========================================================================
    // Print Errors
    // =========================================================================
    #[error("Print failed: {0}")]
    PrintFailed(String),

    #[error("I/O error: {0}")]
    Io(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Checkout session is shutting down")]
    ShuttingDown,

    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::InvalidResponse(err.to_string())
        } else if err.is_timeout() {
            EngineError::Timeout(err.to_string())
        } else {
            EngineError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Text for the cashier.
    ///
    /// Server rejections are shown verbatim, checkout rules use their own
    /// message, and transport failures collapse into one connectivity
    /// message.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ServerRejected { message, .. } => message.clone(),
            EngineError::Checkout(err) => err.to_string(),
            EngineError::Busy => self.to_string(),
            EngineError::NotFound(what) => format!("Not found: {}", what),
            EngineError::PrintFailed(msg) => format!("Could not print the document: {}", msg),
            _ => CONNECTIVITY_MESSAGE.to_string(),
        }
    }

    /// Returns true if the same request may succeed when sent again.
    ///
    /// Nothing retries automatically; this only decides whether the cashier
    /// is offered a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) | EngineError::Timeout(_) | EngineError::PrintFailed(_) => true,
            EngineError::ServerRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::InvalidUrl(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// Blocking client-side failures, produced before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Checkout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::Money;

    #[test]
    fn test_user_message_passes_server_text_through() {
        let err = EngineError::ServerRejected {
            status: 422,
            message: "Stock insuficiente para Queso".into(),
        };
        assert_eq!(err.user_message(), "Stock insuficiente para Queso");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_network_errors_collapse_to_connectivity_message() {
        assert_eq!(EngineError::Network("refused".into()).user_message(), CONNECTIVITY_MESSAGE);
        assert_eq!(EngineError::InvalidResponse("eof".into()).user_message(), CONNECTIVITY_MESSAGE);
        assert!(EngineError::Network("refused".into()).is_retryable());
    }

    #[test]
    fn test_checkout_errors_are_validation() {
        let err: EngineError = CoreError::Reconciliation {
            difference: Money::from_units(-50),
        }
        .into();
        assert!(err.is_validation());
        assert!(err.user_message().contains("-$50.00"));
    }

    #[test]
    fn test_retryable_server_errors() {
        let err = EngineError::ServerRejected {
            status: 503,
            message: "mantenimiento".into(),
        };
        assert!(err.is_retryable());
        assert!(!EngineError::InvalidConfig("x".into()).is_retryable());
        assert!(EngineError::InvalidUrl("x".into()).is_config_error());
    }
}
