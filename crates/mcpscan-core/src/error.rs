//! Error types for the mcpscan engine

use thiserror::Error;

/// Result type alias using the mcpscan Error
pub type Result<T> = std::result::Result<T, Error>;

/// mcpscan error types
///
/// Per-probe failures (refused connections, timeouts, dialect mismatches) are
/// not represented here: they are folded into a probe outcome and never leave
/// the probe boundary. Only failures a caller must act on surface as `Error`.
#[derive(Error, Debug)]
pub enum Error {
    // === Target Errors ===
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    // === Enumeration Errors ===
    #[error("Tool enumeration failed for {url}: {reason}")]
    EnumerationFailed { url: String, reason: String },

    #[error("Tool enumeration for {url} returned HTTP {status}")]
    EnumerationStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("JSON-RPC error from {url}: {code} {message}")]
    Rpc {
        url: String,
        code: i64,
        message: String,
    },

    #[error("Dialect {dialect} does not support tool enumeration")]
    UnsupportedDialect { dialect: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === Transport Errors ===
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl Error {
    /// Check if this error came from a `tools/list` call against a known service
    pub fn is_enumeration_failure(&self) -> bool {
        matches!(
            self,
            Error::EnumerationFailed { .. }
                | Error::EnumerationStatus { .. }
                | Error::MalformedResponse { .. }
                | Error::Rpc { .. }
                | Error::UnsupportedDialect { .. }
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidTarget(_) => "INVALID_TARGET",
            Error::EnumerationFailed { .. } => "ENUMERATION_FAILED",
            Error::EnumerationStatus { .. } => "ENUMERATION_STATUS",
            Error::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Error::Rpc { .. } => "RPC_ERROR",
            Error::UnsupportedDialect { .. } => "UNSUPPORTED_DIALECT",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::HttpClient(_) => "HTTP_CLIENT_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_classification() {
        let err = Error::EnumerationStatus {
            url: "http://127.0.0.1:3001/mcp".into(),
            status: 500,
        };
        assert!(err.is_enumeration_failure());
        assert_eq!(err.code(), "ENUMERATION_STATUS");

        let err = Error::InvalidTarget("port 0".into());
        assert!(!err.is_enumeration_failure());
        assert_eq!(err.code(), "INVALID_TARGET");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Rpc {
            url: "http://localhost:3000/mcp".into(),
            code: -32601,
            message: "Method not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "JSON-RPC error from http://localhost:3000/mcp: -32601 Method not found"
        );
    }
}
