//! Bibliographic metadata lookups.
//!
//! Each source (Google Books, Open Library) only knows how to phrase a search and
//! read its own JSON; [`ProviderClient`] wraps one source with the shared cache,
//! throttle, retry loop and edition preference.

mod google_books;
mod open_library;

pub use google_books::GoogleBooks;
pub use open_library::OpenLibrary;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{ApiCache, CacheLookup, Provider};
use crate::config::{API_REQUEST_DELAY, MAX_RETRIES, RETRY_DELAY};
use crate::model::Series;
use crate::normalize::cache_key;

/// Publisher name fragments that mark a French edition.
const FRENCH_PUBLISHERS: &[&str] = &[
    "gallimard",
    "hachette",
    "flammarion",
    "actes sud",
    "seuil",
    "albin michel",
    "grasset",
    "pocket",
    "j'ai lu",
    "folio",
    "plon",
    "robert laffont",
    "éditions",
    "larousse",
    "nathan",
    "denoël",
    "fayard",
    "minuit",
    "belfond",
    "stock",
    "puf",
];

pub fn is_french_publisher(publisher: &str) -> bool {
    let lower = publisher.to_lowercase();
    FRENCH_PUBLISHERS.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authorization refused (HTTP {0})")]
    Unauthorized(u16),
    #[error("too many requests (HTTP 429)")]
    RateLimited,
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Throttling and timeouts are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited | ProviderError::Timeout)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// HTTP access used by the providers and the cover downloader.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, ProviderError>;
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Artificial delays (throttle, backoff) go through here so tests never wait.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { client })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        match status.as_u16() {
            401 | 403 => Err(ProviderError::Unauthorized(status.as_u16())),
            429 => Err(ProviderError::RateLimited),
            code if !status.is_success() => Err(ProviderError::Status(code)),
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, ProviderError> {
        let response = self.send(self.client.get(url).query(query)).await?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

/// Provider-independent view of one chosen candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub summary: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub series: Option<Series>,
    pub cover_url: Option<String>,
}

/// What a concrete bibliographic API contributes to a lookup.
pub trait MetadataSource: Send + Sync {
    fn provider(&self) -> Provider;
    fn search_request(&self, title: &str, author: Option<&str>) -> SearchRequest;
    /// Raw candidate entries from a search response body.
    fn candidates(&self, body: Value) -> Vec<Value>;
    /// French language or French publisher.
    fn is_preferred_edition(&self, candidate: &Value) -> bool;
    fn metadata(&self, candidate: &Value) -> Option<ProviderMetadata>;
}

/// First preferred edition, else the first candidate.
pub fn choose_edition(source: &dyn MetadataSource, candidates: Vec<Value>) -> Option<Value> {
    let index = candidates
        .iter()
        .position(|c| source.is_preferred_edition(c))
        .unwrap_or(0);
    candidates.into_iter().nth(index)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub backoff: Duration,
    /// Pause before every fresh (uncached) query
    pub throttle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: RETRY_DELAY,
            throttle: API_REQUEST_DELAY,
        }
    }
}

pub struct ProviderClient {
    source: Box<dyn MetadataSource>,
    fetch: Arc<dyn HttpFetch>,
    sleeper: Arc<dyn Sleep>,
    policy: RetryPolicy,
}

impl ProviderClient {
    pub fn new(
        source: Box<dyn MetadataSource>,
        fetch: Arc<dyn HttpFetch>,
        sleeper: Arc<dyn Sleep>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            fetch,
            sleeper,
            policy,
        }
    }

    pub fn provider(&self) -> Provider {
        self.source.provider()
    }

    /// Cached-or-fetched metadata for a title. Never fails: every error degrades to `None`.
    pub async fn lookup(
        &self,
        cache: &mut ApiCache,
        title: &str,
        author: Option<&str>,
    ) -> Option<ProviderMetadata> {
        let provider = self.provider();
        let key = cache_key(title, author);
        let candidate = match cache.get(provider, &key) {
            CacheLookup::Hit(value) => {
                debug!("cache hit for {:?} ({})", title, provider);
                value.cloned()
            }
            CacheLookup::Miss => match self.search(title, author).await {
                Ok(chosen) => {
                    cache.put(provider, &key, chosen.clone());
                    chosen
                }
                Err(e @ ProviderError::Unauthorized(_)) => {
                    error!("{provider} lookup for {title:?} refused: {e}");
                    None
                }
                Err(e) => {
                    warn!("{provider} lookup for {title:?} failed: {e}");
                    None
                }
            },
        };
        candidate.as_ref().and_then(|c| self.source.metadata(c))
    }

    async fn search(&self, title: &str, author: Option<&str>) -> Result<Option<Value>, ProviderError> {
        self.sleeper.sleep(self.policy.throttle).await;
        info!("API lookup for {:?} ({})", title, self.provider());
        let request = self.source.search_request(title, author);
        let body = self.fetch_with_retry(&request).await?;
        let candidates = self.source.candidates(body);
        debug!("{} candidates from {}", candidates.len(), self.provider());
        Ok(choose_edition(self.source.as_ref(), candidates))
    }

    async fn fetch_with_retry(&self, request: &SearchRequest) -> Result<Value, ProviderError> {
        let mut retries = 0;
        loop {
            match self.fetch.get_json(&request.url, &request.query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        "{}: {e}, retry {}/{} in {}s",
                        self.provider(),
                        retries,
                        self.policy.max_retries,
                        self.policy.backoff.as_secs_f32()
                    );
                    self.sleeper.sleep(self.policy.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// Positive integer from a JSON number or numeric string
fn positive_number(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}

// First non-blank string of a string or array value
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s.clone())),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}


#[cfg(test)]
mod tests {
    use super::testing::{MockFetch, RecordingSleep};
    use super::*;
    use serde_json::json;

    fn google_client(fetch: Arc<MockFetch>, sleep: Arc<RecordingSleep>) -> ProviderClient {
        ProviderClient::new(Box::new(GoogleBooks::new(None)), fetch, sleep, RetryPolicy::default())
    }

    fn volume(title: &str, language: &str) -> Value {
        json!({"volumeInfo": {"title": title, "language": language, "authors": ["Someone"]}})
    }

    #[test]
    fn french_publisher_detection() {
        assert!(is_french_publisher("Éditions du Seuil"));
        assert!(is_french_publisher("GALLIMARD"));
        assert!(!is_french_publisher("Penguin Books"));
    }

    #[test]
    fn positive_number_accepts_numeric_strings() {
        assert_eq!(positive_number(&json!(3)), Some(3));
        assert_eq!(positive_number(&json!(" 7 ")), Some(7));
        assert_eq!(positive_number(&json!(0)), None);
        assert_eq!(positive_number(&json!("deux")), None);
    }

    #[tokio::test]
    async fn cached_value_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        cache.put(Provider::GoogleBooks, &cache_key("Dune", None), Some(volume("Dune", "fr")));
        cache.put(Provider::GoogleBooks, &cache_key("Inconnu", None), None);

        let fetch = Arc::new(MockFetch::new());
        let sleep = Arc::new(RecordingSleep::default());
        let client = google_client(fetch.clone(), sleep.clone());

        let hit = client.lookup(&mut cache, "Dune", None).await.expect("cached metadata");
        assert_eq!(hit.title.as_deref(), Some("Dune"));
        assert!(client.lookup(&mut cache, "Inconnu", None).await.is_none());

        assert_eq!(fetch.json_calls(), 0);
        assert!(sleep.slept().is_empty());
    }

    #[tokio::test]
    async fn french_edition_preferred_over_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        let body = json!({"items": [volume("The Stranger", "en"), volume("L'Étranger", "fr")]});
        let fetch = Arc::new(MockFetch::new().json(Ok(body)));
        let client = google_client(fetch.clone(), Arc::new(RecordingSleep::default()));

        let meta = client.lookup(&mut cache, "L'Étranger", Some("Camus")).await.unwrap();
        assert_eq!(meta.title.as_deref(), Some("L'Étranger"));
        assert_eq!(meta.language.as_deref(), Some("fr"));
        let sent = &fetch.queries()[0];
        assert!(sent.contains(&("q".to_string(), "intitle:\"L'Étranger\" inauthor:\"Camus\"".to_string())));
    }

    #[tokio::test]
    async fn retries_after_rate_limit_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        let fetch = Arc::new(
            MockFetch::new()
                .json(Err(ProviderError::RateLimited))
                .json(Err(ProviderError::RateLimited))
                .json(Ok(json!({"items": [volume("Dune", "fr")]}))),
        );
        let sleep = Arc::new(RecordingSleep::default());
        let client = google_client(fetch.clone(), sleep.clone());

        let meta = client.lookup(&mut cache, "Dune", None).await;
        assert_eq!(meta.and_then(|m| m.title).as_deref(), Some("Dune"));
        assert_eq!(fetch.json_calls(), 3);
        assert_eq!(sleep.slept(), vec![API_REQUEST_DELAY, RETRY_DELAY, RETRY_DELAY]);
        assert!(matches!(cache.get(Provider::GoogleBooks, "dune"), CacheLookup::Hit(Some(_))));
    }

    #[tokio::test]
    async fn retry_budget_exhausted_yields_none_and_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        let mut fetch = MockFetch::new();
        for _ in 0..=MAX_RETRIES {
            fetch = fetch.json(Err(ProviderError::RateLimited));
        }
        let fetch = Arc::new(fetch);
        let client = google_client(fetch.clone(), Arc::new(RecordingSleep::default()));

        assert!(client.lookup(&mut cache, "Dune", None).await.is_none());
        assert_eq!(fetch.json_calls(), MAX_RETRIES + 1);
        assert_eq!(cache.get(Provider::GoogleBooks, "dune"), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        let fetch = Arc::new(
            MockFetch::new()
                .json(Err(ProviderError::Unauthorized(403)))
                .json(Ok(json!({"items": [volume("Dune", "fr")]}))),
        );
        let client = google_client(fetch.clone(), Arc::new(RecordingSleep::default()));

        assert!(client.lookup(&mut cache, "Dune", None).await.is_none());
        assert_eq!(fetch.json_calls(), 1);
    }

    #[tokio::test]
    async fn empty_result_is_cached_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ApiCache::load(&dir.path().join("cache.json"));
        let fetch = Arc::new(MockFetch::new().json(Ok(json!({"totalItems": 0}))));
        let client = google_client(fetch.clone(), Arc::new(RecordingSleep::default()));

        assert!(client.lookup(&mut cache, "Nulle Part", Some("Personne")).await.is_none());
        assert_eq!(
            cache.get(Provider::GoogleBooks, "nullepart_personne"),
            CacheLookup::Hit(None)
        );
        // second lookup is served from the cache
        assert!(client.lookup(&mut cache, "Nulle Part", Some("Personne")).await.is_none());
        assert_eq!(fetch.json_calls(), 1);
    }

    // Serves one response: headers announcing `declared` body bytes, then `body`, then holds the socket.
    async fn one_shot_server(declared: usize, body: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {declared}\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        format!("http://{addr}/volumes")
    }

    #[tokio::test]
    async fn body_stalling_past_the_timeout_is_retryable() {
        let url = one_shot_server(64, b"{\"items\": [").await;
        let fetch = ReqwestFetch::new(Duration::from_millis(300)).unwrap();

        let err = fetch.get_json(&url, &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_a_final_decode_error() {
        let url = one_shot_server(9, b"not json!").await;
        let fetch = ReqwestFetch::new(Duration::from_secs(2)).unwrap();

        let err = fetch.get_json(&url, &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)), "got {err:?}");
        assert!(!err.is_retryable());
    }
}
