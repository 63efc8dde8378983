//! Error taxonomy for the translation pipeline.
//!
//! Provider-native failures (HTTP statuses, `reqwest` errors) are converted to
//! [`ProviderError`] at the adapter boundary and never travel further.

use serde::Serialize;
use thiserror::Error;

/// Typed failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ProviderError {
    #[error("Provider rate limit reached: {0}")]
    RateLimited(String),

    #[error("Provider rejected language: {0}")]
    InvalidLanguage(String),

    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("Provider rejected credential: {0}")]
    Unauthorized(String),
}

impl ProviderError {
    /// Whether this error makes the rest of the batch pointless.
    ///
    /// A rejected credential fails every remaining pair the same way, and a
    /// rate limit that survived the retry budget will not clear within one batch.
    pub fn is_batch_scoped(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::RateLimited(_))
    }

    /// Whether a retry of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Unreachable(_))
    }
}

/// Errors raised inside the translation subsystem.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported language: '{0}'")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Quota exceeded for tenant {tenant_id}: {requested} characters requested, {remaining} remaining")]
    QuotaExceeded {
        tenant_id: i64,
        requested: i64,
        remaining: i64,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, TranslateError>;
