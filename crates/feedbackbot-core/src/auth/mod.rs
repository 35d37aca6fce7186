//! Authentication module for managing tokens and the signed-in user.
//!
//! This module provides:
//! - `CredentialStore`: the injectable auth state the API client reads from
//! - `MemoryStore`: in-process implementation
//! - `PersistentStore`: keychain-backed implementation that survives restarts
//! - `AuthEvent`: login/refresh/logout notifications

pub mod events;
pub mod keychain;
pub mod store;

pub use events::AuthEvent;
pub use keychain::{Keychain, PersistentStore};
pub use store::{AuthState, CredentialStore, MemoryStore};
