//! HTTP Transport
//!
//! HTTP client interface and implementations for backend requests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AuthError;

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// JSON response with the given status.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: body.to_string(),
        }
    }

    /// Response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: String::new(),
        }
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    ///
    /// Non-2xx statuses are returned as responses; only transport failures are
    /// errors, classified as [`AuthError::Timeout`] or [`AuthError::Network`].
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError>;
}

/// Send `request`, failing with [`AuthError::Timeout`] once its own timeout
/// elapses regardless of how the transport handles deadlines.
pub async fn send_with_deadline<T: HttpTransport + ?Sized>(
    transport: &T,
    request: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    match request.timeout {
        Some(timeout) => tokio::time::timeout(timeout, transport.send(request))
            .await
            .unwrap_or(Err(AuthError::timeout(timeout))),
        None => transport.send(request).await,
    }
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> Result<Self, AuthError> {
        Self::with_options(Duration::from_secs(30), 4 * 1048576) // 4MB
    }

    /// Create transport with custom options.
    pub fn with_options(timeout: Duration, max_response_size: usize) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_size,
        })
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = self
            .client
            .request(Self::method(request.method), &request.url)
            .timeout(timeout);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::timeout(timeout)
            } else {
                AuthError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_response_size {
                return Err(AuthError::parsing(format!(
                    "response of {} bytes exceeds limit",
                    len
                )));
            }
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::timeout(timeout)
            } else {
                AuthError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        if body.len() > self.max_response_size {
            return Err(AuthError::parsing(format!(
                "response of {} bytes exceeds limit",
                body.len()
            )));
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

type Responder = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse, AuthError> + Send + Sync>;

struct Route {
    method: HttpMethod,
    path: String,
    delay: Option<Duration>,
    responder: Responder,
}

/// Mock HTTP transport for testing.
///
/// Requests are matched against routes registered with [`MockHttpTransport::on`]
/// first (by method and URL path suffix), then answered from the FIFO queue,
/// then from the default response.
#[derive(Default)]
pub struct MockHttpTransport {
    routes: Mutex<Vec<Route>>,
    responses: Mutex<VecDeque<Result<HttpResponse, AuthError>>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `path` with `responder`.
    pub fn on<F>(&self, method: HttpMethod, path: &str, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, AuthError> + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            delay: None,
            responder: Arc::new(responder),
        });
        self
    }

    /// Like [`MockHttpTransport::on`], answering after `delay`.
    pub fn on_delayed<F>(&self, method: HttpMethod, path: &str, delay: Duration, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, AuthError> + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            delay: Some(delay),
            responder: Arc::new(responder),
        });
        self
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.queue_response(HttpResponse::json(status, body))
    }

    /// Queue a transport failure.
    pub fn queue_error(&self, error: AuthError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *self.default_response.lock() = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().clone()
    }

    /// Requests whose URL ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.request_history
            .lock()
            .iter()
            .filter(|r| url_path_matches(&r.url, path))
            .cloned()
            .collect()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.request_history.lock().last().cloned()
    }

    /// Clear request history.
    pub fn clear_history(&self) {
        self.request_history.lock().clear();
    }

    fn route_for(&self, request: &HttpRequest) -> Option<(Option<Duration>, Responder)> {
        self.routes
            .lock()
            .iter()
            .find(|r| r.method == request.method && url_path_matches(&request.url, &r.path))
            .map(|r| (r.delay, r.responder.clone()))
    }
}

fn url_path_matches(url: &str, path: &str) -> bool {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query.ends_with(path)
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        self.request_history.lock().push(request.clone());

        if let Some((delay, responder)) = self.route_for(&request) {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            return responder(&request);
        }

        if let Some(queued) = self.responses.lock().pop_front() {
            return queued;
        }

        self.default_response.lock().clone().ok_or_else(|| {
            AuthError::network("No mock response available")
        })
    }
}

/// Create production HTTP transport.
pub fn create_transport(timeout: Option<Duration>) -> Result<ReqwestHttpTransport, AuthError> {
    match timeout {
        Some(t) => ReqwestHttpTransport::with_options(t, 4 * 1048576),
        None => ReqwestHttpTransport::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_mock_transport_queue_is_fifo() {
        let transport = MockHttpTransport::new();
        transport.queue_json_response(200, &serde_json::json!({"n": 1}));
        transport.queue_json_response(500, &serde_json::json!({"n": 2}));

        let first = transport.send(get("https://example.com/a")).await.unwrap();
        let second = transport.send(get("https://example.com/b")).await.unwrap();
        assert_eq!(first.status, 200);
        assert_eq!(second.status, 500);

        let history = transport.get_requests();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_mock_transport_routes_by_path() {
        let transport = MockHttpTransport::new();
        transport.on(HttpMethod::Get, "/peajes", |req| {
            let status = if req.header("Authorization").is_some() { 200 } else { 401 };
            Ok(HttpResponse::empty(status))
        });

        let mut request = get("https://example.com/api/peajes?page=2");
        assert_eq!(transport.send(request.clone()).await.unwrap().status, 401);

        request
            .headers
            .insert("authorization".to_string(), "Bearer x".to_string());
        assert_eq!(transport.send(request).await.unwrap().status, 200);
        assert_eq!(transport.requests_to("/peajes").len(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_queued_error_then_default() {
        let transport = MockHttpTransport::new();
        transport
            .queue_error(AuthError::network("connection reset"))
            .set_default_response(HttpResponse::empty(204));

        let error = transport.send(get("https://example.com/a")).await.unwrap_err();
        assert_eq!(error, AuthError::network("connection reset"));

        // Queue exhausted: every later request gets the default.
        for _ in 0..2 {
            let response = transport.send(get("https://example.com/b")).await.unwrap();
            assert_eq!(response.status, 204);
        }
        assert_eq!(transport.get_requests().len(), 3);

        transport.clear_history();
        assert!(transport.get_requests().is_empty());
        assert!(transport.get_last_request().is_none());
    }

    #[tokio::test]
    async fn test_mock_transport_without_response_is_network_error() {
        let transport = MockHttpTransport::new();
        let error = transport.send(get("https://example.com")).await.unwrap_err();
        assert_eq!(error.code(), "NETWORK_ERROR");
    }

    #[tokio::test]
    async fn test_send_with_deadline_times_out() {
        let transport = MockHttpTransport::new();
        transport.on_delayed(HttpMethod::Get, "/lento", Duration::from_millis(200), |_| {
            Ok(HttpResponse::empty(200))
        });

        let mut request = get("https://example.com/lento");
        request.timeout = Some(Duration::from_millis(20));

        let error = send_with_deadline(&transport, request).await.unwrap_err();
        assert_eq!(error, AuthError::timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_http_method_as_str() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
        assert_eq!(HttpMethod::Put.as_str(), "PUT");
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }
}
