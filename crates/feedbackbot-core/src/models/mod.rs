//! Data models for the feedbackbot REST API.
//!
//! This module contains the records the console reads and writes:
//!
//! - `Envelope`: the `{"data": ..., "message": ...}` wrapper every response uses
//! - `User`, `AuthTokens`, `AuthConfig`: login and session data
//! - `Tenant`, `Bot`: tenant setup
//! - `Group`, `FeedbackConfig`: group chats the bot is in
//! - `Feedback`, `FeedbackPage`, `FeedbackParams`: submitted feedback

pub mod auth;
pub mod envelope;
pub mod feedback;
pub mod group;
pub mod tenant;

pub use auth::{AuthConfig, AuthTokens, ForgotPassword, TokenPair, User};
pub use envelope::Envelope;
pub use feedback::{AdminFilter, Feedback, FeedbackPage, FeedbackParams, DEFAULT_PAGE_SIZE};
pub use group::{FeedbackConfig, Group, GroupType};
pub use tenant::{Bot, Tenant};
