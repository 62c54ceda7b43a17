// src/services/fetch.rs

//! Page fetchers.
//!
//! A plain HTTP fetch is tried first; when a rendering service is configured
//! it takes over for bodies that look truncated or fetches that fail.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;
use crate::utils::retry::RetryPolicy;

/// Retrieves the document for an address.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the HTML for `url`, failing with [`AppError::Fetch`] after retries.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Release any session held by the fetcher.
    async fn close(&self) {}
}

/// Build the fetcher for a run from crawler settings.
pub fn build_fetcher(config: &CrawlerConfig) -> Result<Box<dyn PageFetcher>> {
    let http = HttpFetcher::new(config)?;
    match config.render_endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            log::info!("Render fallback enabled via {}", endpoint);
            let render = RenderFetcher::new(http.client.clone(), endpoint, config.retry_policy());
            Ok(Box::new(FallbackFetcher::new(
                http,
                render,
                config.min_body_bytes,
            )))
        }
        _ => Ok(Box::new(http)),
    }
}

/// GET with attempt-scaled backoff; non-200 responses are retried.
async fn get_with_retry(
    client: &Client,
    target: &str,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=attempts {
        match client.get(target).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => match resp.text().await {
                Ok(body) => return Ok(body),
                Err(e) => last_error = format!("body read failed: {e}"),
            },
            Ok(resp) => last_error = format!("status {}", resp.status()),
            Err(e) => last_error = e.to_string(),
        }

        log::warn!(
            "GET {} failed (attempt {}/{}): {}",
            url,
            attempt,
            attempts,
            last_error
        );
        if attempt < attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }

    Err(AppError::fetch(url, last_error))
}

/// Lightweight fetcher over a shared HTTP client.
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(config)?,
            config.retry_policy(),
        ))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        get_with_retry(&self.client, url, url, &self.policy).await
    }
}

/// Fetches through an external rendering service.
///
/// The endpoint either contains a `{url}` placeholder or receives the target
/// as a `url` query parameter.
pub struct RenderFetcher {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl RenderFetcher {
    pub fn new(client: Client, endpoint: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            policy,
        }
    }

    /// Service address that renders `url`.
    pub fn request_url(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        if self.endpoint.contains("{url}") {
            return self.endpoint.replace("{url}", &encoded);
        }
        let joiner = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}url={}", self.endpoint, joiner, encoded)
    }
}

#[async_trait]
impl PageFetcher for RenderFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let target = self.request_url(url);
        get_with_retry(&self.client, &target, url, &self.policy).await
    }

    async fn close(&self) {
        log::debug!("Render session released ({})", self.endpoint);
    }
}

/// Light fetch first, heavy fetch when the light body looks truncated.
pub struct FallbackFetcher<L, H> {
    light: L,
    heavy: H,
    min_body_bytes: usize,
}

impl<L: PageFetcher, H: PageFetcher> FallbackFetcher<L, H> {
    pub fn new(light: L, heavy: H, min_body_bytes: usize) -> Self {
        Self {
            light,
            heavy,
            min_body_bytes,
        }
    }
}

#[async_trait]
impl<L: PageFetcher, H: PageFetcher> PageFetcher for FallbackFetcher<L, H> {
    async fn fetch(&self, url: &str) -> Result<String> {
        match self.light.fetch(url).await {
            Ok(body) if body.len() >= self.min_body_bytes => Ok(body),
            Ok(body) => {
                log::debug!(
                    "{} returned {} bytes (< {}); rendering",
                    url,
                    body.len(),
                    self.min_body_bytes
                );
                match self.heavy.fetch(url).await {
                    Ok(rendered) => Ok(rendered),
                    Err(e) => {
                        log::warn!("Render failed for {}, keeping short body: {}", url, e);
                        Ok(body)
                    }
                }
            }
            Err(e) => {
                log::warn!("Plain fetch failed for {}: {}; rendering", url, e);
                self.heavy.fetch(url).await
            }
        }
    }

    async fn close(&self) {
        self.light.close().await;
        self.heavy.close().await;
    }
}
