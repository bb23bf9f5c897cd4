//! Error types for the transfer client.
//!
//! # Design
//! `TransferFailed` keeps the engine's numeric code and message side by side
//! so callers can match on the code while the display string stays in the
//! `Error: <message> and the Error no is: <code> ` form that existing log
//! scrapers expect. Option problems are collected in `ConfigError` because
//! they are only detected when an execution merges the option set.

use std::fmt;

use thiserror::Error;

/// Errors returned by `HttpClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transfer engine could not provide a handle on this host.
    #[error("transfer engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    /// The engine reported a non-zero error code for the transfer.
    #[error("Error: {message} and the Error no is: {code} ")]
    TransferFailed { code: u32, message: String },

    /// The merged option set could not be built.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// `TRANSFER_*` environment variables did not form a valid config.
    #[error("invalid client configuration: {0}")]
    Environment(#[from] figment::Error),

    /// The form body could not be encoded.
    #[error(transparent)]
    Encoding(#[from] serde_urlencoded::ser::Error),

    /// The client was used after `close()`.
    #[error("client handle is closed")]
    Closed,
}

impl From<TransferError> for ClientError {
    fn from(e: TransferError) -> Self {
        ClientError::TransferFailed {
            code: e.code,
            message: e.message,
        }
    }
}

/// Problems found while merging overrides into the option set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The key does not name a recognized option.
    #[error("unknown transfer option: {key}")]
    UnknownOption { key: String },

    /// The value has the wrong kind for the option.
    #[error("option {option} expects {expected}, got {found}")]
    InvalidValue {
        option: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Neither `set_url` nor a `CURLOPT_URL` override supplied a target.
    #[error("no URL set")]
    MissingUrl,
}

/// Code and message recorded after a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferError {
    pub code: u32,
    pub message: String,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_failed_display_keeps_trailing_space() {
        let err = ClientError::TransferFailed {
            code: 6,
            message: "Could not resolve host: nowhere".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error: Could not resolve host: nowhere and the Error no is: 6 "
        );
    }

    #[test]
    fn configuration_error_is_transparent() {
        let err = ClientError::from(ConfigError::UnknownOption {
            key: "CURLOPT_BOGUS".to_string(),
        });
        assert_eq!(err.to_string(), "unknown transfer option: CURLOPT_BOGUS");
    }

    #[test]
    fn transfer_error_converts_into_transfer_failed() {
        let err = ClientError::from(TransferError {
            code: 28,
            message: "timed out".to_string(),
        });
        assert!(matches!(err, ClientError::TransferFailed { code: 28, .. }));
    }
}
