//! Core library for the feedbackbot admin console.
//!
//! Provides the authenticated API client, credential storage, data models and
//! configuration shared by the console front ends.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthEvent, CredentialStore, Keychain, MemoryStore, PersistentStore};
pub use config::Config;
