//! Error types for the automation engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the automation engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Preflight validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: f64, required: f64 },

    #[error("{token} balance not enough: balance {available}, required {required}")]
    InsufficientTokenBalance {
        token: String,
        available: f64,
        required: f64,
    },

    // Strategy / feature construction errors
    #[error("Unsupported strategy type: {0}")]
    UnsupportedStrategyType(String),

    #[error("Unsupported feature type: {0}")]
    UnsupportedFeatureType(String),

    // External call errors
    #[error("External call failed: {0}")]
    ExternalCall(String),

    #[error("{action} reverted, receipt status is not 1 (tx {tx_hash})")]
    TransactionReverted { action: String, tx_hash: String },

    #[error("Approve failed for {token}: allowance {allowance} < required {required}")]
    AllowanceNotGranted {
        token: String,
        allowance: u128,
        required: u128,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Gateway request timed out after {0}ms")]
    GatewayTimeout(u64),

    // Notification errors (never surfaced past a sink)
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a preflight validation failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InsufficientBalance { .. }
                | Error::InsufficientTokenBalance { .. }
        )
    }

    /// Check if this error is retryable at the transport layer (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Gateway(_) | Error::GatewayTimeout(_))
    }

    /// Check if this error came from an unknown strategy or feature tag
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedStrategyType(_) | Error::UnsupportedFeatureType(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Gateway(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
