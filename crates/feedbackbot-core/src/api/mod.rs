//! REST API client module for the feedbackbot backend.
//!
//! This module provides the `ApiClient` every console operation goes
//! through. It attaches the bearer token from the credential store, puts a
//! deadline on reads, and transparently refreshes an expired access token,
//! making sure concurrent failures share a single refresh exchange.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod refresh;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use endpoints::FeedbackConfigUpdate;
pub use error::ApiError;
pub use refresh::RefreshCoordinator;
pub use request::{Attempt, PreparedRequest, RequestDescriptor, GET_TIMEOUT};
pub use transport::{HttpTransport, RawResponse, Transport};
