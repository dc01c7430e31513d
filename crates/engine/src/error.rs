//! Error types for the external collaborators

use thiserror::Error;

/// Failure to obtain a fresh observation; the symbol is skipped this cycle
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Malformed(e.to_string())
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

/// Failure to deliver an emitted signal; never rolls back gate state
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}
