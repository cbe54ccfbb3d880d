pub mod metadata;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{AuditError, Result};
use crate::model::{IssueCode, PageMetadata};
use crate::parser::classify::ClassifiedLink;

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ── Ports ──

/// Retrieves newsletter markup for a URL.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String>;
}

/// Retrieves the structured facts of a linked page.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageMetadata>;
}

/// Analyzes a whole batch of links in one request, keyed by link URL.
#[async_trait]
pub trait BulkAnalyzer: Send + Sync {
    async fn analyze_batch(&self, links: &[ClassifiedLink]) -> Result<HashMap<String, BulkEntry>>;
}

/// Per-link answer of the bulk analyzer. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkEntry {
    pub key_info: Option<PageMetadata>,
    pub suggested_text: Option<String>,
    pub accuracy: Option<f64>,
    pub issues: Vec<IssueCode>,
}

// ── HTTP ──

/// Plain HTTP fetcher serving both newsletter markup and link metadata.
pub struct HttpFetcher {
    client: Client,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            backoff: Duration::from_millis(BASE_BACKOFF_MS),
        })
    }

    /// First retry delay; doubles on each further attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn get_with_retry(&self, url: &str) -> Result<String> {
        let attempts = MAX_RETRIES + 1;
        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            let reason = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }
                    if !should_retry(status) || last {
                        return Err(AuditError::fetch(url, format!("HTTP {}", status.as_u16())));
                    }
                    format!("HTTP {}", status.as_u16())
                }
                Err(e) => {
                    if !is_transient(&e) || last {
                        return Err(AuditError::fetch(url, e.to_string()));
                    }
                    e.to_string()
                }
            };

            let backoff = self.backoff * 2u32.pow(attempt);
            warn!(
                "{} on {} (attempt {}/{}), backing off {:.1}s",
                reason,
                url,
                attempt + 1,
                attempts,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }
        Err(AuditError::fetch(url, "retries exhausted"))
    }
}

fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Timeouts and refused or reset connections are worth another try.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[async_trait]
impl DocumentSource for HttpFetcher {
    async fn fetch_document(&self, url: &str) -> Result<String> {
        self.get_with_retry(url).await
    }
}

#[async_trait]
impl MetadataFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageMetadata> {
        if metadata::is_form_url(url) {
            return Ok(metadata::form_metadata());
        }
        let html = self.get_with_retry(url).await?;
        debug!("Fetched {} ({} bytes)", url, html.len());
        Ok(metadata::extract(&html, url))
    }
}

/// Remote bulk analyzer: `POST {"links": [...]}` answered by a URL-keyed map.
pub struct HttpBulkAnalyzer {
    client: Client,
    endpoint: String,
}

impl HttpBulkAnalyzer {
    pub fn new(endpoint: impl Into<String>, settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    links: &'a [ClassifiedLink],
}

#[async_trait]
impl BulkAnalyzer for HttpBulkAnalyzer {
    async fn analyze_batch(&self, links: &[ClassifiedLink]) -> Result<HashMap<String, BulkEntry>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&BulkRequest { links })
            .send()
            .await
            .map_err(|e| AuditError::BulkAnalysis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::BulkAnalysis(format!("HTTP {}", status.as_u16())));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuditError::BulkAnalysis(e.to_string()))?;
        parse_bulk_response(body)
    }
}

/// A top-level `"error"` field means the whole batch failed.
fn parse_bulk_response(body: serde_json::Value) -> Result<HashMap<String, BulkEntry>> {
    if let Some(err) = body.get("error") {
        let reason = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(AuditError::BulkAnalysis(reason));
    }
    serde_json::from_value(body).map_err(|e| AuditError::BulkAnalysis(e.to_string()))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn retries_only_transient_statuses() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(should_retry(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::FORBIDDEN));
    }

    #[test]
    fn bulk_response_maps_by_url() {
        let body = json!({
            "https://a.example/job": {
                "key_info": {"title": "개발자", "organizer": "에이"},
                "suggested_text": "[에이] 개발자",
                "accuracy": 72.6,
                "issues": ["date-missing"]
            },
            "https://b.example/x": {}
        });
        let map = parse_bulk_response(body).unwrap();
        let a = &map["https://a.example/job"];
        assert_eq!(a.accuracy, Some(72.6));
        assert_eq!(a.issues, vec![IssueCode::DateMissing]);
        assert_eq!(
            a.key_info.as_ref().and_then(|m| m.organizer.as_deref()),
            Some("에이")
        );
        let b = &map["https://b.example/x"];
        assert!(b.key_info.is_none());
        assert!(b.issues.is_empty());
    }

    #[test]
    fn bulk_error_field_fails_batch() {
        let err = parse_bulk_response(json!({"error": "model unavailable"})).unwrap_err();
        assert!(matches!(err, AuditError::BulkAnalysis(ref m) if m == "model unavailable"));
    }

    #[test]
    fn bulk_garbage_fails_batch() {
        assert!(parse_bulk_response(json!([1, 2, 3])).is_err());
    }

    /// Local server that counts connections and answers each with `respond`.
    async fn serve(respond: fn(usize) -> Option<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut sock, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                match respond(n) {
                    Some(reply) => {
                        let _ = sock.write_all(reply.as_bytes()).await;
                    }
                    // Never answer; the client has to time out.
                    None => held.push(sock),
                }
            }
        });
        (format!("http://{}/letter", addr), hits)
    }

    fn fast_fetcher() -> HttpFetcher {
        let settings = Settings {
            timeout: Duration::from_millis(300),
            ..Settings::default()
        };
        HttpFetcher::new(&settings)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
    const OK: &str = "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok";
    const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

    #[tokio::test]
    async fn unavailable_status_is_retried() {
        let (url, hits) = serve(|n| Some(if n < 2 { UNAVAILABLE } else { OK })).await;
        let body = fast_fetcher().fetch_document(&url).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let (url, hits) = serve(|_| Some(NOT_FOUND)).await;
        let err = fast_fetcher().fetch_document(&url).await.unwrap_err();
        assert!(matches!(err, AuditError::Fetch { ref reason, .. } if reason == "HTTP 404"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_are_retried_until_exhausted() {
        let (url, hits) = serve(|_| None).await;
        let err = fast_fetcher().fetch_document(&url).await.unwrap_err();
        assert!(matches!(err, AuditError::Fetch { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), MAX_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn form_links_skip_network() {
        let fetcher = HttpFetcher::new(&Settings::default()).unwrap();
        let meta = MetadataFetcher::fetch(&fetcher, "https://forms.gle/abc").await.unwrap();
        assert_eq!(meta.title.as_deref(), Some("Google Form"));
        assert!(!meta.error);
    }
}
