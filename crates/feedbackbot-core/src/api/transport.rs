//! The seam between the request pipeline and the network.

use std::future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::request::PreparedRequest;
use super::ApiError;

/// Connection establishment timeout in seconds.
/// Reads carry their own deadline; this only bounds the TCP/TLS handshake.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return whatever the server answered. Only
    /// failures to get an answer at all are errors here.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, ApiError>;
}

/// `reqwest`-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method = %request.method, url = %request.url, status = status.as_u16(), "Response received");
        Ok(RawResponse { status, body })
    }
}

/// Send `request`, abandoning it when its cancellation token fires or its
/// deadline passes. Whichever finishes first wins; the losers (including the
/// deadline timer) are dropped with it.
pub async fn send_guarded(
    transport: &dyn Transport,
    request: &PreparedRequest,
) -> Result<RawResponse, ApiError> {
    tokio::select! {
        biased;
        _ = cancelled(request.cancel.as_ref()) => Err(ApiError::Cancelled),
        _ = deadline(request.deadline) => Err(ApiError::Timeout),
        response = transport.send(request) => response,
    }
}

pub(crate) async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => future::pending().await,
    }
}

pub(crate) async fn deadline(after: Option<Duration>) {
    match after {
        Some(after) => tokio::time::sleep(after).await,
        None => future::pending().await,
    }
}
