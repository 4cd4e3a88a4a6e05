use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidIdentity {
    #[error("identity is empty")]
    Empty,

    #[error("identity '{0}' is longer than 39 characters")]
    TooLong(String),

    #[error("identity '{0}' may only contain letters, digits and inner hyphens")]
    BadCharacters(String),
}

/// Why a single fetch failed. Connectors decide what each kind means for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unexpected payload: {0}")]
    Parse(String),
}

/// Coarse failure category, used for exit codes and section status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Auth,
    NotFound,
    RateLimit,
    Network,
    Timeout,
    Parse,
}

impl FetchError {
    pub fn category(&self) -> FailureCategory {
        match self {
            FetchError::Auth(_) => FailureCategory::Auth,
            FetchError::NotFound(_) => FailureCategory::NotFound,
            FetchError::RateLimited(_) => FailureCategory::RateLimit,
            FetchError::Network(_) => FailureCategory::Network,
            FetchError::Timeout(_) => FailureCategory::Timeout,
            FetchError::Parse(_) => FailureCategory::Parse,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited(_) | FetchError::Network(_) | FetchError::Timeout(_)
        )
    }

    /// Failures that stale cached data may stand in for. Auth and NotFound say
    /// something about the identity itself, so old data must not mask them.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, FetchError::Auth(_) | FetchError::NotFound(_))
    }
}
