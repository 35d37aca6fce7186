//! API client for the feedbackbot REST API.
//!
//! Every request goes through the same path: the descriptor is run through
//! the request pipeline (timeout guard, bearer credentials), sent with its
//! cancellation guards, and the response unwrapped. A 401 on a non-exempt
//! request hands over to the [`RefreshCoordinator`] and the request is
//! replayed once with the refreshed token.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::refresh::RefreshCoordinator;
use super::request::{default_deadline, prepare, Attempt, RequestDescriptor};
use super::transport::{cancelled, deadline, send_guarded, HttpTransport, RawResponse, Transport};
use super::ApiError;
use crate::auth::{AuthEvent, CredentialStore};
use crate::models::{Envelope, TokenPair};

/// Refresh-token exchange endpoint
const REFRESH_PATH: &str = "/auth/refresh";

/// A refresh exchange that takes longer than this fails the cycle.
const REFRESH_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Capacity of the auth event channel. Slow subscribers miss old events
/// rather than blocking the client.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// API client shared by every feature operation.
/// Clone is cheap - all state lives behind one Arc.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    /// Create a client that talks to `base_url` over HTTP
    pub fn new(base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Ok(Self::with_transport(base_url, store, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let refresh = Arc::new(RefreshCoordinator::new(Arc::clone(&store), events.clone()));
        Self {
            inner: Arc::new(ClientInner {
                base_url: base_url.into(),
                transport,
                store,
                refresh,
                events,
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.token().is_some()
    }

    /// Listen for login, refresh, logout and re-authentication events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Send a request and deserialize the response body.
    pub async fn request<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        let body = self.execute(&descriptor).await?;
        decode(&descriptor.path, &body)
    }

    /// Send a request and return the envelope's `data`.
    pub async fn fetch<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        self.request::<Envelope<T>>(descriptor).await.map(Envelope::into_data)
    }

    /// Run one logical request. The default deadline covers every attempt
    /// and the wait for a refresh in between, as does the caller's token.
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<String, ApiError> {
        let started = Instant::now();
        let budget = default_deadline(&descriptor.method, descriptor.cancel.as_ref());
        let mut attempt = Attempt::first();
        loop {
            let (result, bearer) = self.inner.dispatch(descriptor, attempt, started).await;
            match result {
                Err(e) if attempt.may_refresh(descriptor, &e) => {
                    warn!(path = %descriptor.path, "Request unauthorized, awaiting token refresh");
                    let inner = Arc::clone(&self.inner);
                    let refreshed = self
                        .inner
                        .refresh
                        .await_fresh_token(bearer.as_deref(), move |refresh_token| {
                            inner.exchange_refresh_token(refresh_token)
                        });
                    tokio::select! {
                        biased;
                        _ = cancelled(descriptor.cancel.as_ref()) => return Err(ApiError::Cancelled),
                        _ = deadline(remaining(budget, started)) => return Err(ApiError::Timeout),
                        outcome = refreshed => outcome?,
                    }
                    attempt = attempt.retry();
                }
                other => return other,
            }
        }
    }
}

impl ClientInner {
    /// One transport attempt. Also returns the bearer token that was sent so
    /// the refresh path can tell a stale rejection from a current one.
    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        attempt: Attempt,
        started: Instant,
    ) -> (Result<String, ApiError>, Option<String>) {
        let mut request = prepare(descriptor, &self.base_url, self.store.as_ref());
        request.deadline = remaining(request.deadline, started);
        debug!(
            method = %request.method,
            url = %request.url,
            retry = attempt.is_retry(),
            authenticated = request.bearer.is_some(),
            "Sending request"
        );

        let result = match send_guarded(self.transport.as_ref(), &request).await {
            Ok(response) => unwrap_response(response),
            Err(e) => {
                debug!(url = %request.url, error = %e, "Request failed before a response arrived");
                Err(e)
            }
        };
        (result, request.bearer)
    }

    /// Trade a refresh token for a new access token. Runs credential-exempt
    /// so a rejected refresh never re-enters the refresh path.
    async fn exchange_refresh_token(self: Arc<Self>, refresh_token: String) -> Result<TokenPair, ApiError> {
        let descriptor = RequestDescriptor::post(REFRESH_PATH)
            .json(&json!({ "refresh_token": refresh_token }))?
            .credential_exempt();
        let exchange = self.dispatch(&descriptor, Attempt::first(), Instant::now());
        let (result, _) = tokio::time::timeout(REFRESH_TIMEOUT, exchange)
            .await
            .map_err(|_| ApiError::Timeout)?;
        let envelope: Envelope<TokenPair> = decode(REFRESH_PATH, &result?)?;
        Ok(envelope.into_data())
    }
}

/// What is left of `budget` since `started`.
fn remaining(budget: Option<Duration>, started: Instant) -> Option<Duration> {
    budget.map(|budget| budget.saturating_sub(started.elapsed()))
}

/// Keep the body of a 2xx response, turn anything else into an error.
fn unwrap_response(response: RawResponse) -> Result<String, ApiError> {
    if response.status.is_success() {
        Ok(response.body)
    } else {
        Err(ApiError::from_status(response.status, &response.body))
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    let parsed = if body.trim().is_empty() {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_str(body)
    };
    parsed.map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
}
