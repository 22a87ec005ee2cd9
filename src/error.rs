//! Error types for the scraping client.
//!
//! Parsing-layer absence is recovered locally wherever a default preserves
//! the aggregate snapshot; anything that could corrupt a financial action
//! (authentication, trade validation, confirmation, required-token
//! extraction) surfaces as one of these kinds and stops the operation.

use thiserror::Error;

/// Errors that can occur when talking to the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    /// Login was rejected or the session expired. Fatal to the client.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A field marked required was absent from a scraped document.
    #[error("required field missing from document: {field}")]
    ExtractionIncomplete {
        /// Name of the missing field.
        field: String,
    },

    /// The quote endpoint returned no usable quote data.
    #[error("no quote data for {symbol}")]
    QuoteUnavailable {
        /// Symbol the lookup was for.
        symbol: String,
    },

    /// Trade type is not valid for the target instrument class.
    #[error("invalid trade type: {0}")]
    InvalidTradeType(String),

    /// Order type is not valid for the target instrument class.
    #[error("invalid order type: {0}")]
    InvalidOrderType(String),

    /// Order duration is not valid for the target instrument class.
    #[error("invalid order duration: {0}")]
    InvalidOrderDuration(String),

    /// Trade quantity exceeds the configured per-trade ceiling.
    #[error("trade quantity {quantity} exceeds maximum {max} shares per trade")]
    TradeExceedsMaxShares {
        /// Requested quantity.
        quantity: u32,
        /// Configured ceiling.
        max: u32,
    },

    /// Submission went out but the confirmation indicator was absent.
    ///
    /// The trade's actual state is unknown and must be treated as
    /// unconfirmed, not failed.
    #[error("trade submitted but no confirmation indicator in response")]
    TradeNotValidated,

    /// A contract symbol did not match the fixed encoding.
    #[error("invalid option contract symbol: {0}")]
    InvalidContractSymbol(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the site.
    #[error("HTTP error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Creates an extraction error naming the missing field.
    pub fn extraction_incomplete(field: impl Into<String>) -> Self {
        Self::ExtractionIncomplete {
            field: field.into(),
        }
    }

    /// Creates a quote-unavailable error for a symbol.
    pub fn quote_unavailable(symbol: impl Into<String>) -> Self {
        Self::QuoteUnavailable {
            symbol: symbol.into(),
        }
    }

    /// Creates an HTTP-status error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the request may succeed if retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Network(_) | Self::Timeout(_) => Some(1),
            Self::Api { status, .. } if *status >= 500 => Some(2),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SimError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Construction Tests ====================

    #[test]
    fn test_extraction_incomplete_names_field() {
        let err = SimError::extraction_incomplete("account_value");
        assert!(err.to_string().contains("account_value"));
    }

    #[test]
    fn test_quote_unavailable_names_symbol() {
        let err = SimError::quote_unavailable("AAPL");
        assert!(err.to_string().contains("AAPL"));
    }

    #[test]
    fn test_api_error_construction() {
        let err = SimError::api(502, "bad gateway");
        assert!(matches!(err, SimError::Api { status: 502, .. }));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_max_shares_display() {
        let err = SimError::TradeExceedsMaxShares {
            quantity: 5000,
            max: 1000,
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("1000"));
    }

    // ==================== Transience Tests ====================

    #[test]
    fn test_network_error_is_transient() {
        let err = SimError::Network("connection refused".to_string());
        assert!(err.is_transient());
        assert_eq!(err.retry_delay_secs(), Some(1));
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = SimError::api(503, "unavailable");
        assert!(err.is_transient());
        assert_eq!(err.retry_delay_secs(), Some(2));
    }

    #[test]
    fn test_client_error_is_not_transient() {
        let err = SimError::api(404, "not found");
        assert!(!err.is_transient());
        assert_eq!(err.retry_delay_secs(), None);
    }

    #[test]
    fn test_auth_error_is_not_transient() {
        let err = SimError::AuthenticationFailed("bad password".to_string());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_trade_not_validated_is_not_transient() {
        // Retrying an unconfirmed submission could double-trade.
        assert!(!SimError::TradeNotValidated.is_transient());
    }
}
