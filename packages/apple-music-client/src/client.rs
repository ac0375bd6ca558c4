//! Apple Music API client implementation

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use playhead_shared_config::AppleMusicConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{AppleMusicError, AppleMusicResult};
use crate::models::{CatalogTrack, ErrorResponse, ResourcePage, SearchResponse};
use crate::token::TokenProvider;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Apple caps catalog search pages at 25 results
const MAX_SEARCH_LIMIT: u32 = 25;

/// Maximum search term length
const MAX_TERM_LENGTH: usize = 256;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Apple Music catalog client
#[derive(Clone)]
pub struct AppleMusicClient {
    http_client: Client,
    base_url: String,
    storefront: String,
    tokens: Arc<TokenProvider>,
    max_retries: u32,
}

impl fmt::Debug for AppleMusicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleMusicClient")
            .field("base_url", &self.base_url)
            .field("storefront", &self.storefront)
            .field("developer_token", &"[REDACTED]")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AppleMusicClient {
    /// Create a new client from configuration
    pub fn new(config: &AppleMusicConfig) -> AppleMusicResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("Playhead/2.0")
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            storefront: config.storefront.clone(),
            tokens: Arc::new(TokenProvider::new(
                config.credentials.clone(),
                config.token_ttl_secs,
            )),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the retry count (tests use 0 to fail fast)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Current developer token and its unix expiry (0 for pre-signed tokens)
    pub fn developer_token(&self) -> AppleMusicResult<(String, u64)> {
        self.tokens.token()
    }

    fn validate_term(term: &str) -> AppleMusicResult<&str> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Err(AppleMusicError::InvalidInput(
                "search term cannot be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_TERM_LENGTH {
            return Err(AppleMusicError::InvalidInput(format!(
                "search term too long (max {} characters)",
                MAX_TERM_LENGTH
            )));
        }
        Ok(trimmed)
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> AppleMusicResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppleMusicResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay_ms = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Apple Music request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// GET a catalog path and map error statuses
    async fn get(&self, path: &str, query: &[(&str, &str)], resource: &str) -> AppleMusicResult<String> {
        let (token, _) = self.tokens.token()?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppleMusicError::Timeout
                } else {
                    AppleMusicError::Http(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppleMusicError::Unauthorized(status.as_u16())
            }
            StatusCode::NOT_FOUND => AppleMusicError::NotFound(resource.to_string()),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Apple Music API rate limited");
                AppleMusicError::RateLimited
            }
            _ => AppleMusicError::Api {
                status: status.as_u16(),
                message: serde_json::from_str::<ErrorResponse>(&text)
                    .ok()
                    .and_then(|e| e.message())
                    .unwrap_or(text),
            },
        })
    }

    /// Search catalog songs
    ///
    /// `limit` is clamped to Apple's page size of 1..=25.
    ///
    /// # Errors
    /// - `AppleMusicError::InvalidInput` - If the term is empty or too long
    /// - `AppleMusicError::Unauthorized` - If the developer token is rejected
    /// - `AppleMusicError::Http` - If the HTTP request fails
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, limit: u32) -> AppleMusicResult<Vec<CatalogTrack>> {
        let term = Self::validate_term(term)?;
        let limit_str = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let path = format!("v1/catalog/{}/search", self.storefront);

        debug!(term = %term, limit = %limit_str, "Searching Apple Music catalog");

        let text = self
            .with_retry(|| async {
                self.get(
                    &path,
                    &[("term", term), ("types", "songs"), ("limit", &limit_str)],
                    term,
                )
                .await
            })
            .await?;

        let response: SearchResponse = serde_json::from_str(&text)?;
        let tracks: Vec<CatalogTrack> = response
            .results
            .songs
            .map(|page| page.data)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|song| song.into_track())
            .collect();

        debug!(term = %term, result_count = tracks.len(), "Catalog search complete");

        Ok(tracks)
    }

    /// Fetch one song by catalog id
    ///
    /// # Errors
    /// - `AppleMusicError::NotFound` - If no song has this id
    #[instrument(skip(self))]
    pub async fn song(&self, id: &str) -> AppleMusicResult<CatalogTrack> {
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(AppleMusicError::InvalidInput(format!(
                "'{}' is not a catalog id",
                id
            )));
        }

        let path = format!("v1/catalog/{}/songs/{}", self.storefront, id);
        let text = self
            .with_retry(|| async { self.get(&path, &[], id).await })
            .await?;

        let page: ResourcePage = serde_json::from_str(&text)?;
        page.data
            .into_iter()
            .next()
            .and_then(|song| song.into_track())
            .ok_or_else(|| AppleMusicError::NotFound(id.to_string()))
    }
}
