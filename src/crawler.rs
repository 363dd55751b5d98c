use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::FetchSettings;
use crate::error::FetchError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Statuses that mean "try again later" rather than "this page is wrong".
pub const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Raw page as the server returned it after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can turn a URL into a page.
///
/// Retries are the implementor's business: callers only ever see the final
/// response or the final failure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed fetcher with browser headers and exponential backoff.
///
/// One instance per worker; the connection pool inside is the only state.
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    /// Delay before the attempt following `attempt`: base, 2x base, 4x base...
    fn backoff(&self, attempt: u32) -> Duration {
        self.settings.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

fn is_retryable_transport(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let last_attempt = attempt >= max_attempts;

            let resp = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) if is_retryable_transport(&e) && !last_attempt => {
                    let wait = self.backoff(attempt);
                    debug!("Attempt {}/{} for {} failed ({}), retrying in {:?}", attempt, max_attempts, url, e, wait);
                    sleep(wait).await;
                    continue;
                }
                Err(source) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            };

            let status = resp.status().as_u16();
            if RETRYABLE_STATUSES.contains(&status) {
                if last_attempt {
                    warn!("{} still answering {} after {} attempts", url, status, attempt);
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        status,
                        attempts: attempt,
                    });
                }
                let wait = self.backoff(attempt);
                debug!("{} answered {} (attempt {}/{}), retrying in {:?}", url, status, attempt, max_attempts, wait);
                sleep(wait).await;
                continue;
            }

            let final_url = resp.url().to_string();
            let content = resp.text().await.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                attempts: attempt,
                source,
            })?;

            return Ok(FetchedPage {
                url: final_url,
                status,
                content,
            });
        }
    }
}
