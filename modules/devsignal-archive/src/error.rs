use apify_client::ApifyError;
use browserless_client::BrowserlessError;
use devsignal_common::FetchError;
use github_client::GithubError;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache write task failed: {0}")]
    Task(String),
}

// The client crates and FetchError are all foreign here, so these are plain
// functions rather than From impls.

pub(crate) fn from_github(err: GithubError) -> FetchError {
    match err {
        GithubError::Network(m) => FetchError::Network(m),
        GithubError::Timeout(m) => FetchError::Timeout(m),
        GithubError::Unauthorized(m) => FetchError::Auth(m),
        GithubError::NotFound(m) => FetchError::NotFound(m),
        GithubError::RateLimited { reset_at } => FetchError::RateLimited(match reset_at {
            Some(ts) => format!("GitHub rate limit, resets at {ts}"),
            None => "GitHub rate limit".to_string(),
        }),
        GithubError::Api { status, message } if status >= 500 => {
            FetchError::Network(format!("GitHub returned {status}: {message}"))
        }
        GithubError::Api { status, message } => {
            FetchError::Parse(format!("GitHub returned {status}: {message}"))
        }
        GithubError::Parse(m) => FetchError::Parse(m),
        GithubError::GraphQl(m) => FetchError::Parse(format!("GraphQL errors: {m}")),
    }
}

pub(crate) fn from_browserless(err: BrowserlessError) -> FetchError {
    match err {
        BrowserlessError::Network(m) => FetchError::Network(m),
        BrowserlessError::Timeout(m) => FetchError::Timeout(m),
        BrowserlessError::Unauthorized => FetchError::Auth("Browserless rejected the token".into()),
        BrowserlessError::RateLimited => {
            FetchError::RateLimited("Browserless concurrency limit".into())
        }
        BrowserlessError::Api { status: 404, message } => FetchError::NotFound(message),
        BrowserlessError::Api { status, message } => {
            FetchError::Network(format!("Browserless returned {status}: {message}"))
        }
    }
}

pub(crate) fn from_apify(err: ApifyError) -> FetchError {
    match err {
        ApifyError::Network(m) => FetchError::Network(m),
        ApifyError::Timeout(m) => FetchError::Timeout(m),
        ApifyError::Unauthorized => FetchError::Auth("invalid Apify token".into()),
        ApifyError::RateLimited => FetchError::RateLimited("Apify rate limit".into()),
        ApifyError::Api { status, message } if status >= 500 => {
            FetchError::Network(format!("Apify returned {status}: {message}"))
        }
        ApifyError::Api { status, message } => {
            FetchError::Parse(format!("Apify returned {status}: {message}"))
        }
        ApifyError::Parse(m) => FetchError::Parse(m),
        ApifyError::RunFailed(status) => FetchError::Network(format!("actor run {status}")),
    }
}

pub(crate) fn from_reqwest(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_decode() {
        FetchError::Parse(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}
