//! Network collaborator: request/response types, the `Fetch` seam, and the
//! HTTP implementation over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::cache::CacheEntry;
use crate::{Result, WorkerError};

/// An intercepted HTTP request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: Method,

    /// Request headers.
    pub headers: HeaderMap,
}

impl FetchRequest {
    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }

    /// Create a request with an explicit method.
    pub fn with_method(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this request is eligible for interception.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// A captured HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL of the response.
    pub url: String,

    /// Status code.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body. Fully materialized, so duplicating a response for the
    /// cache is a cheap clone.
    pub body: Bytes,

    /// Whether this response was served from the cache store.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Check if the response status is a success (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Rehydrate a response from a cache entry. Fails if the stored status
    /// is not a valid HTTP status, which marks the entry as corrupt.
    pub fn from_entry(entry: &CacheEntry) -> Result<Self> {
        let status = StatusCode::from_u16(entry.status)
            .map_err(|_| WorkerError::Cache(format!("invalid stored status {}", entry.status)))?;

        Ok(Self {
            url: entry.url.clone(),
            status,
            headers: map_to_headers(&entry.headers),
            body: Bytes::from(entry.body.clone()),
            from_cache: true,
        })
    }
}

pub(crate) fn headers_to_map(headers: &HeaderMap) -> hashbrown::HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

pub(crate) fn map_to_headers(map: &hashbrown::HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in map {
        if let (Ok(n), Ok(v)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            headers.insert(n, v);
        }
    }
    headers
}

/// The network collaborator.
///
/// A transport failure (offline, DNS) is an error; a response with a non-2xx
/// status is still a response.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issue the request and capture the response.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Scope the shell is served from. Relative request URLs resolve against
    /// it, the way a worker resolves assets against its registration scope.
    pub scope: Option<Url>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "AppShellSW/1.0".to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            scope: None,
        }
    }
}

/// Network fetcher over HTTP.
pub struct HttpFetcher {
    client: Client,
    scope: Option<Url>,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            scope: config.scope,
        })
    }

    /// Resolve a request URL, joining relative ones against the scope.
    fn resolve(&self, raw: &str) -> Result<Url> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.scope {
                Some(scope) => scope
                    .join(raw)
                    .map_err(|e| WorkerError::InvalidUrl(format!("{raw}: {e}"))),
                None => Err(WorkerError::InvalidUrl(format!(
                    "{raw}: relative URL with no scope configured"
                ))),
            },
            Err(e) => Err(WorkerError::InvalidUrl(format!("{raw}: {e}"))),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let url = self.resolve(&request.url)?;

        debug!(url = %url, method = %request.method, "Fetching resource");

        let mut req_builder = self.client.request(request.method.clone(), url);
        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_builder() {
        let request = FetchRequest::get("https://example.com/app.js").header(
            HeaderName::from_static("accept"),
            HeaderValue::from_static("application/javascript"),
        );

        assert!(request.is_get());
        assert!(request.headers.contains_key("accept"));
    }

    #[test]
    fn test_non_get_request() {
        let request = FetchRequest::with_method(Method::POST, "https://example.com/submit");
        assert!(!request.is_get());
    }

    #[test]
    fn test_response_entry_roundtrip() {
        let response = FetchResponse {
            url: "https://example.com/index.html".to_string(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"<html></html>"),
            from_cache: false,
        };

        let entry = CacheEntry::from_response("https://example.com/index.html", &response);
        let rehydrated = FetchResponse::from_entry(&entry).unwrap();

        assert_eq!(rehydrated.status, StatusCode::OK);
        assert_eq!(rehydrated.body, response.body);
        assert!(rehydrated.from_cache);
    }

    #[test]
    fn test_from_entry_rejects_invalid_status() {
        let entry = CacheEntry {
            url: "https://example.com/index.html".to_string(),
            method: "GET".to_string(),
            status: 99,
            headers: Default::default(),
            body: b"junk".to_vec(),
            cached_at: 0,
        };

        assert!(matches!(
            FetchResponse::from_entry(&entry),
            Err(WorkerError::Cache(_))
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        let response = fetcher
            .fetch(&FetchRequest::get(format!("{}/app.js", server.uri())))
            .await
            .unwrap();

        assert!(response.ok());
        assert!(!response.from_cache);
        assert_eq!(response.body.as_ref(), b"console.log(1)");
    }

    #[tokio::test]
    async fn test_http_fetcher_non_2xx_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        let response = fetcher
            .fetch(&FetchRequest::get(format!("{}/missing", server.uri())))
            .await
            .unwrap();

        assert!(!response.ok());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_http_fetcher_transport_failure() {
        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        let result = fetcher
            .fetch(&FetchRequest::get("http://127.0.0.1:1/unreachable"))
            .await;

        assert!(matches!(result, Err(WorkerError::Network(_))));
    }

    #[tokio::test]
    async fn test_http_fetcher_resolves_relative_against_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>shell</html>"))
            .mount(&server)
            .await;

        let config = HttpFetcherConfig {
            scope: Some(Url::parse(&format!("{}/app/", server.uri())).unwrap()),
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config).unwrap();

        let manifest = fetcher
            .fetch(&FetchRequest::get("manifest.json"))
            .await
            .unwrap();
        assert_eq!(manifest.body.as_ref(), b"{}");

        // "." is the scope itself, the shell document.
        let shell = fetcher.fetch(&FetchRequest::get(".")).await.unwrap();
        assert_eq!(shell.body.as_ref(), b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_relative_url_without_scope() {
        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        let result = fetcher.fetch(&FetchRequest::get("manifest.json")).await;

        assert!(matches!(result, Err(WorkerError::InvalidUrl(_))));
    }
}
