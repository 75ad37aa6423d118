use crate::types::{FetchConfig, FetchErrorKind, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client shared by all source adapters.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// GET `url` and return the body as text, retrying transient failures with
    /// exponential backoff.
    pub async fn fetch_text(&self, url: &Url) -> std::result::Result<String, FetchErrorKind> {
        let start_time = Instant::now();
        debug!("Fetching {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = FetchErrorKind::Http("no attempt made".to_string());

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit(url).await;

            match self.fetch_once(url).await {
                Ok(content) => {
                    info!(
                        "Fetched {} ({} bytes in {}ms)",
                        url,
                        content.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(content);
                }
                Err(e) if is_retryable(&e) && attempt < self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("Attempt {} failed for {} ({}), retrying in {:?}", attempt + 1, url, e, delay);
                            last_error = e;
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, FetchErrorKind> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchErrorKind::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchErrorKind::Status(status.as_u16()));
        }

        let limit = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(FetchErrorKind::TooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchErrorKind::Http(e.to_string()))?;
        if body.len() > limit {
            return Err(FetchErrorKind::TooLarge {
                size_mb: body.len() / (1024 * 1024),
            });
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn apply_rate_limit(&self, url: &Url) {
        let host = url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.host_interval_ms);

        let wait = {
            let mut rate_limiter = self.rate_limiter.lock().await;
            let now = Instant::now();
            let next_slot = match rate_limiter.get(&host) {
                Some(last) if now.duration_since(*last) < min_interval => *last + min_interval,
                _ => now,
            };
            rate_limiter.insert(host.clone(), next_slot);
            next_slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }
}

fn is_retryable(error: &FetchErrorKind) -> bool {
    match error {
        FetchErrorKind::Http(_) | FetchErrorKind::Timeout(_) => true,
        FetchErrorKind::Status(code) => {
            *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(code)
        }
        FetchErrorKind::Parse(_)
        | FetchErrorKind::TooLarge { .. }
        | FetchErrorKind::InvalidUrl(_)
        | FetchErrorKind::Panicked(_) => false,
    }
}
