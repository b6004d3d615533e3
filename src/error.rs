//! Error types for the collaborators around the costing engine.
//!
//! The engine itself is total and has no error type.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::retry::RetryableError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Recipe name must not be empty")]
    EmptyName,

    #[error("Recipe '{0}' not found")]
    NotFound(String),

    #[error("Recipe store error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to encode recipe document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Recipe store unavailable: {0}")]
    Unavailable(String),

    #[error("Recipe store still busy after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<StoreError> },
}

impl StoreError {
    /// Only a busy or locked database is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

impl RetryableError for StoreError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    fn exhausted(attempts: u32, last: Self) -> Self {
        StoreError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Saving is unavailable: no recipe store is configured")]
    NoStore,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("No API key configured for ingredient suggestions")]
    MissingCredential,

    #[error("API key was rejected by the suggestion service: {0}")]
    InvalidCredential(String),

    #[error("Suggestion request failed: {0}")]
    Transient(String),

    #[error("Suggestion service unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<SuggestionError> },
}

impl SuggestionError {
    /// Credential problems are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SuggestionError::Transient(_))
    }
}

impl RetryableError for SuggestionError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    fn exhausted(attempts: u32, last: Self) -> Self {
        SuggestionError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Unknown setting '{0}'. Known: currency, gemini_api_key, gemini_model, database")]
    UnknownKey(String),
}

#[derive(Debug, Error)]
#[error("Unknown field '{0}'")]
pub struct UnknownField(pub String);
