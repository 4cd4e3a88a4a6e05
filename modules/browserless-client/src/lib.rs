pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

/// Milliseconds to let client-side frameworks hydrate before the DOM is captured.
const HYDRATION_WAIT_MS: u64 = 3000;

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserlessError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
        })
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2" },
            "waitForTimeout": HYDRATION_WAIT_MS,
        });

        let resp = self.client.post(&endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::debug!(url, status = status.as_u16(), "Browserless request failed");
            return Err(match status.as_u16() {
                401 | 403 => BrowserlessError::Unauthorized,
                429 => BrowserlessError::RateLimited,
                code => BrowserlessError::Api {
                    status: code,
                    message,
                },
            });
        }

        Ok(resp.text().await?)
    }
}
