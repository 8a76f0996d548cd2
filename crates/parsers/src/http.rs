// ABOUTME: HTTP fetching for adapters: GET/POST with per-source user agent, headers and timeout.
// ABOUTME: Enforces a body size limit and decodes bodies using the declared or detected charset.

use bytes::Bytes;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::ParserError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, using the charset from the content-type header when present.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

/// Thin wrapper over `reqwest::Client` configured for one source.
///
/// Cloning is cheap; clones share the connection pool and cookie store.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: SourceConfig,
}

impl HttpClient {
    pub fn new(config: SourceConfig) -> Result<Self, ParserError> {
        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| {
                ParserError::fetch(
                    config.base_url(),
                    "HttpClient",
                    Some(anyhow::anyhow!("failed to build client: {}", e)),
                )
            })?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// GET `url` with the source headers plus `headers`.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchResult, ParserError> {
        let parsed = parse_http_url(url)?;
        let mut request = self.inner.get(parsed);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        debug!(url, "GET");
        self.send(url, request).await
    }

    /// GET `url` and decode the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, ParserError> {
        Ok(self.get(url, &[]).await?.text())
    }

    /// POST an urlencoded form and decode the response body as text.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<String, ParserError> {
        let parsed = parse_http_url(url)?;
        let mut request = self.inner.post(parsed).form(form);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }
        debug!(url, "POST");
        Ok(self.send(url, request).await?.text())
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<FetchResult, ParserError> {
        let response = request.send().await.map_err(|e| request_error(url, e))?;

        if let Some(len) = response.content_length() {
            if len as usize > MAX_CONTENT_LENGTH {
                return Err(ParserError::fetch(
                    url,
                    "Fetch",
                    Some(anyhow::anyhow!("content too large")),
                ));
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;

        if body.len() > MAX_CONTENT_LENGTH {
            return Err(ParserError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }

        if !(200..300).contains(&status) {
            return Err(ParserError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("HTTP status {}", status)),
            ));
        }

        Ok(FetchResult {
            status,
            url: url.to_string(),
            final_url,
            content_type,
            body,
        })
    }
}

fn parse_http_url(url: &str) -> Result<url::Url, ParserError> {
    let parsed = url::Url::parse(url).map_err(|e| {
        ParserError::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(ParserError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        )),
    }
}

fn request_error(url: &str, e: reqwest::Error) -> ParserError {
    if e.is_timeout() {
        ParserError::timeout(url, "Fetch", Some(anyhow::anyhow!("{}", e)))
    } else {
        ParserError::fetch(url, "Fetch", Some(anyhow::anyhow!("request failed: {}", e)))
    }
}
