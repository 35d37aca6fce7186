//! Request descriptors and the outgoing request pipeline.
//!
//! Callers describe a request with [`RequestDescriptor`]. Before it is sent,
//! the descriptor is turned into a [`PreparedRequest`] and passed through an
//! ordered list of [`Step`]s, each returning a new prepared request:
//!
//! 1. [`timeout_guard`]: GETs without a caller cancellation token get the
//!    default deadline
//! 2. [`credentials`]: attach (or strip) the bearer token

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::ApiError;
use crate::auth::CredentialStore;

/// Deadline applied to reads that carry no cancellation token of their own.
pub const GET_TIMEOUT: Duration = Duration::from_millis(15_000);

/// What a caller wants sent. Paths are relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// Skip bearer injection and the refresh-and-retry path (login, public config).
    pub credential_exempt: bool,
    /// Caller-owned cancellation. Takes precedence over the default timeout.
    pub cancel: Option<CancellationToken>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            credential_exempt: false,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid {} header: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn credential_exempt(mut self) -> Self {
        self.credential_exempt = true;
        self
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Per-logical-request attempt metadata, kept apart from the descriptor so
/// the same descriptor can be replayed without carrying state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attempt {
    retried: bool,
}

impl Attempt {
    pub fn first() -> Self {
        Self::default()
    }

    /// The attempt that follows a credential refresh. Sticky: there is no
    /// way back to a non-retried attempt.
    pub fn retry(self) -> Self {
        Self { retried: true }
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }

    /// Whether `error` on this attempt should go through the refresh path.
    pub fn may_refresh(&self, descriptor: &RequestDescriptor, error: &ApiError) -> bool {
        !self.retried && !descriptor.credential_exempt && error.is_unauthorized()
    }
}

/// A descriptor after the pipeline ran: exactly what the transport sends.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub credential_exempt: bool,
    pub cancel: Option<CancellationToken>,
    /// Deadline after which the request is abandoned with `ApiError::Timeout`
    pub deadline: Option<Duration>,
    /// Access token attached by the pipeline, if any
    pub bearer: Option<String>,
}

impl PreparedRequest {
    pub fn from_descriptor(descriptor: &RequestDescriptor, base_url: &str) -> Self {
        Self {
            method: descriptor.method.clone(),
            url: join_url(base_url, &descriptor.path),
            query: descriptor.query.clone(),
            headers: descriptor.headers.clone(),
            body: descriptor.body.clone(),
            credential_exempt: descriptor.credential_exempt,
            cancel: descriptor.cancel.clone(),
            deadline: None,
            bearer: None,
        }
    }
}

/// A single pipeline transform.
pub type Step = fn(PreparedRequest, &dyn CredentialStore) -> PreparedRequest;

/// Steps in the order they run.
pub const PIPELINE: &[Step] = &[timeout_guard, credentials];

/// Build the outgoing request for `descriptor`.
pub fn prepare(
    descriptor: &RequestDescriptor,
    base_url: &str,
    store: &dyn CredentialStore,
) -> PreparedRequest {
    PIPELINE
        .iter()
        .fold(PreparedRequest::from_descriptor(descriptor, base_url), |request, step| {
            step(request, store)
        })
}

/// Deadline a request runs under when the caller supplied no cancellation
/// token of its own. Only reads get one.
pub fn default_deadline(method: &Method, cancel: Option<&CancellationToken>) -> Option<Duration> {
    (*method == Method::GET && cancel.is_none()).then_some(GET_TIMEOUT)
}

/// Give reads without a caller cancellation token the default deadline.
pub fn timeout_guard(mut request: PreparedRequest, _store: &dyn CredentialStore) -> PreparedRequest {
    if let Some(deadline) = default_deadline(&request.method, request.cancel.as_ref()) {
        request.deadline = Some(deadline);
    }
    request
}

/// Attach the current access token, or make sure none is sent for exempt requests.
pub fn credentials(mut request: PreparedRequest, store: &dyn CredentialStore) -> PreparedRequest {
    if request.credential_exempt {
        request.headers.remove(header::AUTHORIZATION);
        request.bearer = None;
        return request;
    }

    if let Some(token) = store.token() {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(header::AUTHORIZATION, value);
                request.bearer = Some(token);
            }
            // The server rejects the request and the refresh path takes over
            Err(_) => warn!("Stored access token is not a valid header value"),
        }
    }
    request
}

fn join_url(base_url: &str, path: &str) -> String {
    match (base_url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base_url, path),
        _ => format!("{}{}", base_url, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    const BASE: &str = "https://api.example.com";

    fn store_with_token(token: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.set_token(token.to_string());
        store
    }

    #[test]
    fn test_get_without_signal_gets_deadline() {
        let store = MemoryStore::new();
        let request = prepare(&RequestDescriptor::get("/bots"), BASE, &store);
        assert_eq!(request.deadline, Some(Duration::from_millis(15_000)));
    }

    #[test]
    fn test_get_with_caller_signal_has_no_deadline() {
        let store = MemoryStore::new();
        let descriptor = RequestDescriptor::get("/bots").cancel_with(CancellationToken::new());
        let request = prepare(&descriptor, BASE, &store);
        assert_eq!(request.deadline, None);
        assert!(request.cancel.is_some());
    }

    #[test]
    fn test_writes_have_no_deadline() {
        let store = MemoryStore::new();
        for descriptor in [
            RequestDescriptor::post("/bots"),
            RequestDescriptor::patch("/groups/1"),
            RequestDescriptor::delete("/bots/1"),
        ] {
            assert_eq!(prepare(&descriptor, BASE, &store).deadline, None);
        }
    }

    #[test]
    fn test_bearer_attached_from_store() {
        let store = store_with_token("abc");
        let request = prepare(&RequestDescriptor::get("/auth/me"), BASE, &store);
        assert_eq!(
            request.headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert_eq!(request.bearer.as_deref(), Some("abc"));
    }

    #[test]
    fn test_no_token_means_no_header() {
        let store = MemoryStore::new();
        let request = prepare(&RequestDescriptor::get("/auth/me"), BASE, &store);
        assert!(request.headers.get(header::AUTHORIZATION).is_none());
        assert!(request.bearer.is_none());
    }

    #[test]
    fn test_exempt_request_never_carries_bearer() {
        let store = store_with_token("abc");
        let descriptor = RequestDescriptor::post("/auth/login")
            .header(header::AUTHORIZATION, "Bearer inherited")
            .expect("valid header")
            .credential_exempt();

        let request = prepare(&descriptor, BASE, &store);
        assert!(request.headers.get(header::AUTHORIZATION).is_none());
        assert!(request.bearer.is_none());
    }

    #[test]
    fn test_prepare_leaves_descriptor_untouched() {
        let store = store_with_token("abc");
        let descriptor = RequestDescriptor::get("/bots/1");
        let _ = prepare(&descriptor, BASE, &store);
        assert!(descriptor.headers.is_empty());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url(BASE, "/bots"), "https://api.example.com/bots");
        assert_eq!(join_url("http://localhost:8080/api/", "/bots"), "http://localhost:8080/api/bots");
        assert_eq!(join_url(BASE, "bots"), "https://api.example.com/bots");
    }

    #[test]
    fn test_attempt_retry_is_sticky() {
        let descriptor = RequestDescriptor::get("/bots");
        let first = Attempt::first();
        assert!(first.may_refresh(&descriptor, &ApiError::Unauthorized));
        assert!(!first.may_refresh(&descriptor, &ApiError::Timeout));

        let retried = first.retry();
        assert!(retried.is_retry());
        assert!(retried.retry().is_retry());
        assert!(!retried.may_refresh(&descriptor, &ApiError::Unauthorized));

        let exempt = RequestDescriptor::post("/auth/login").credential_exempt();
        assert!(!first.may_refresh(&exempt, &ApiError::Unauthorized));
    }
}
