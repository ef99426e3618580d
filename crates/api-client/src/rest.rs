//! REST client implementation
//!
//! This module implements the JSON-over-HTTP resource model used by the
//! moderation endpoints (`/blocklist/...`, `/users/...`). It provides
//! request/response types, error handling, and the core HTTP client.
//!
//! Mutations are fire-and-confirm: the client never retries on its own, the
//! caller decides whether to re-invoke.

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// REST error with HTTP status and message
///
/// Represents both network failures (status `0`) and error responses sent by
/// the server. The message is whatever the server said and is meant to be
/// shown to the user as-is.
///
/// # Examples
/// ```
/// use api_client::ApiError;
///
/// let error = ApiError::new(404, "NotFound", "Block not found");
/// assert_eq!(error.status(), 404);
/// assert!(!error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP error {status}: {code} - {message}")]
pub struct ApiError {
    /// HTTP status code (`0` when no response was received)
    status: u16,
    /// Short error code (e.g. "NotFound", "NetworkError")
    code: String,
    /// Human-readable error message
    message: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the request never produced an HTTP response
    pub fn is_network_error(&self) -> bool {
        self.status == 0
    }

    /// Whether the server reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the server reported a conflicting resource
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for REST requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request (listings)
    Get,
    /// POST request (create / commands)
    Post,
    /// DELETE request
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// REST request
///
/// Method, resource path (relative to the configured base URL), query
/// parameters, headers and an optional body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Resource path (e.g. "/blocklist/accounts")
    pub path: String,
    /// Query parameters, in insertion order
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Body encoding (e.g. "application/json")
    pub encoding: Option<String>,
}

impl ApiRequest {
    /// Create a request with an explicit method
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: HashMap::new(),
            body: None,
            encoding: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.body = Some(body);
        self.encoding = Some("application/json".to_string());
        Ok(self)
    }
}

/// Build a resource path from a prefix and one identifier segment
///
/// The segment is percent-encoded so that `name@host` identities and
/// hostnames travel as a single path component.
///
/// ```
/// use api_client::rest::resource_path;
///
/// assert_eq!(resource_path("/blocklist/servers", "example.org"), "/blocklist/servers/example.org");
/// assert_eq!(resource_path("/blocklist/accounts", "bob@example.org"), "/blocklist/accounts/bob%40example.org");
/// ```
pub fn resource_path(prefix: &str, segment: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), urlencoding::encode(segment))
}

// =============================================================================
// Response Types
// =============================================================================

/// REST response with status, headers and decoded data
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response data
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new response
    pub fn new(status: u16, headers: HashMap<String, String>, data: T) -> Self {
        Self {
            status,
            headers,
            data,
        }
    }

    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(key)
    }

    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error body returned by the server
///
/// Older endpoints send `{"error": "..."}`, newer ones
/// `{"code": "...", "message": "..."}`; both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Legacy error message field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base API URL (e.g. "https://peertube.example/api/v1")
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers included in every request
    pub default_headers: HashMap<String, String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/api/v1".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("fedi-moderation/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl ApiClientConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// REST client
///
/// # Examples
/// ```
/// use api_client::{ApiClient, ApiClientConfig, ApiRequest};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ApiClient::new(ApiClientConfig::new("https://peertube.example/api/v1"))?;
///
///     let request = ApiRequest::post("/blocklist/servers/spam.example");
///     client.execute(request).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client
    client: ReqwestClient,
    /// Configuration
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a new REST client
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ApiError::new(0, "ClientError", format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Send a request and decode the JSON response body
    pub async fn send_json<T>(&self, request: ApiRequest) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);

        let body = response.text().await.map_err(|e| {
            ApiError::new(0, "ParseError", format!("Failed to read response: {}", e))
        })?;

        let data: T = serde_json::from_str(&body).map_err(|e| {
            ApiError::new(0, "ParseError", format!("Failed to parse JSON: {}", e))
        })?;

        Ok(ApiResponse::new(status, headers, data))
    }

    /// Send a request whose success response carries no body (204)
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse<()>, ApiError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);

        Ok(ApiResponse::new(status, headers, ()))
    }

    /// Issue the request and turn non-2xx statuses into [`ApiError`]
    async fn send(&self, request: ApiRequest) -> Result<ReqwestResponse, ApiError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), request.path);

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            if let Some(encoding) = &request.encoding {
                req = req.header("Content-Type", encoding);
            }
            req = req.body(body);
        }

        tracing::debug!(method = request.method.as_str(), path = %request.path, "sending request");

        let response = req.send().await.map_err(|e| {
            ApiError::new(0, "NetworkError", format!("Request failed: {}", e))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let error_body = response.text().await.unwrap_or_default();
        Err(parse_error_body(status, &error_body))
    }

    /// Get the client configuration
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

fn collect_headers(response: &ReqwestResponse) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (key, value) in response.headers() {
        if let Ok(value_str) = value.to_str() {
            headers.insert(key.to_string(), value_str.to_string());
        }
    }
    headers
}

/// Turn an error response body into an [`ApiError`]
fn parse_error_body(status: u16, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();

    match parsed {
        Some(ApiErrorBody { code, message, error }) if message.is_some() || error.is_some() => {
            let message = message.or(error).unwrap_or_default();
            ApiError::new(status, code.unwrap_or_else(|| default_code(status).to_string()), message)
        }
        _ => ApiError::new(status, default_code(status), format!("HTTP {}: {}", status, body)),
    }
}

fn default_code(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        409 => "Conflict",
        _ => "Unknown",
    }
}

// =============================================================================
// Tests
// =============================================================================
