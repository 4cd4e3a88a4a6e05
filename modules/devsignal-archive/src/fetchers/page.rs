// Page fetchers: Browserless for JS-heavy sites, plain GET when no
// Browserless endpoint is configured.

use std::time::Duration;

use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use devsignal_common::FetchError;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, info, warn};

use super::PageFetcher;
use crate::error::{from_browserless, from_reqwest};

/// Main content shorter than this is a landing page the extraction gutted.
const MIN_MAIN_CONTENT_CHARS: usize = 200;

pub struct BrowserlessPageFetcher {
    client: BrowserlessClient,
}

impl BrowserlessPageFetcher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, FetchError> {
        info!(base_url, "BrowserlessPageFetcher initialized");
        let client = BrowserlessClient::new(base_url, token, timeout).map_err(from_browserless)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for BrowserlessPageFetcher {
    async fn markdown(&self, url: &str) -> Result<String, FetchError> {
        info!(url, fetcher = "browserless", "Fetching page");
        let html = self.client.content(url).await.map_err(from_browserless)?;
        to_markdown(url, "browserless", &html)
    }
}

pub struct DirectPageFetcher {
    client: reqwest::Client,
}

impl DirectPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("devsignal/0.1")
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for DirectPageFetcher {
    async fn markdown(&self, url: &str) -> Result<String, FetchError> {
        info!(url, fetcher = "direct", "Fetching page");
        let resp = self.client.get(url).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => FetchError::Auth(format!("{url} returned {status}")),
                404 | 410 => FetchError::NotFound(url.to_string()),
                429 => FetchError::RateLimited(url.to_string()),
                _ => FetchError::Network(format!("{url} returned {status}")),
            });
        }

        let html = resp.text().await.map_err(from_reqwest)?;
        to_markdown(url, "direct", &html)
    }
}

/// Reduce a page to markdown. Readability's main-content pass comes first;
/// personal landing pages are often all nav, hero and footer, which that pass
/// strips to a line or nothing, so a thin result falls back to the whole page.
pub(crate) fn to_markdown(url: &str, fetcher: &str, html: &str) -> Result<String, FetchError> {
    if html.trim().is_empty() {
        warn!(url, fetcher, "Empty HTML response");
        return Err(FetchError::Parse(format!("{url} had an empty page")));
    }

    let base = url::Url::parse(url).ok();
    let mut markdown = transform(html, base.as_ref(), true);
    if markdown.trim().chars().count() < MIN_MAIN_CONTENT_CHARS {
        debug!(url, fetcher, "Thin main content, converting whole page");
        let whole = transform(html, base.as_ref(), false);
        if whole.trim().len() > markdown.trim().len() {
            markdown = whole;
        }
    }
    if markdown.trim().is_empty() {
        return Err(FetchError::Parse(format!("{url} had no readable content")));
    }

    info!(url, fetcher, bytes = html.len(), "Fetched successfully");
    Ok(markdown)
}

fn transform(html: &str, base: Option<&url::Url>, main_content: bool) -> String {
    let config = TransformConfig {
        readability: main_content,
        main_content,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: main_content,
    };
    let input = TransformInput {
        url: base,
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_page_keeps_its_heading_and_body() {
        let html = "<html><body><main><h1>Ada Lovelace</h1>\
            <p>Compiler engineer working on analytical engines and their notes.</p>\
            </main></body></html>";
        let markdown = to_markdown("https://ada.dev", "test", html).unwrap();
        assert!(markdown.contains("Ada Lovelace"), "{markdown}");
        assert!(markdown.contains("Compiler engineer"), "{markdown}");
    }

    #[test]
    fn footer_only_landing_page_keeps_contact_details() {
        let html = "<html><body><nav><a href=\"/\">Home</a></nav>\
            <footer>Reach me at ada@ada.dev</footer></body></html>";
        let markdown = to_markdown("https://ada.dev", "test", html).unwrap();
        assert!(markdown.contains("ada@ada.dev"), "{markdown}");
    }

    #[test]
    fn blank_page_is_a_parse_error() {
        let err = to_markdown("https://ada.dev", "test", "  \n ").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
