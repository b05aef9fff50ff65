//! Extraction error types.

use thiserror::Error;

use crate::models::InvalidArtworkUrl;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidArtworkUrl),
    #[error("unknown page type (continuation label: {0:?})")]
    UnknownPageType(Option<String>),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("still asked to log in for {url} after {attempts} login attempt(s)")]
    AuthRetriesExhausted { url: String, attempts: u32 },
    #[error("browser unavailable: {0:#}")]
    BrowserUnavailable(anyhow::Error),
    #[error(transparent)]
    Page(#[from] anyhow::Error),
}

impl ExtractError {
    /// Whether the error means no further URL can succeed in this run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BrowserUnavailable(_))
    }
}
