//! Process-wide authentication state.
//!
//! The [`CredentialStore`] trait is what the API client reads tokens from and
//! writes refreshed tokens to. It is passed to the client as a constructor
//! dependency so tests can hand in their own store.

use std::sync::{PoisonError, RwLock};

use crate::models::User;

/// Snapshot of everything the console knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl AuthState {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn user(&self) -> Option<User>;

    fn set_token(&self, token: String);

    fn set_refresh_token(&self, refresh_token: String);

    fn set_user(&self, user: User);

    /// Store a new access token and, if rotated, a new refresh token.
    ///
    /// Implementations should apply both under one lock so that no reader
    /// sees the new access token paired with a stale refresh token.
    fn set_tokens(&self, token: String, refresh_token: Option<String>) {
        self.set_token(token);
        if let Some(refresh_token) = refresh_token {
            self.set_refresh_token(refresh_token);
        }
    }

    /// Remove token, refresh token and user in one step. Clearing an empty
    /// store is a no-op.
    fn clear(&self);

    fn snapshot(&self) -> AuthState {
        AuthState {
            token: self.token(),
            refresh_token: self.refresh_token(),
            user: self.user(),
        }
    }
}

/// In-memory credential store. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<AuthState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with previously persisted state
    pub fn with_state(state: AuthState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&AuthState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut AuthState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl CredentialStore for MemoryStore {
    fn token(&self) -> Option<String> {
        self.read(|s| s.token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.read(|s| s.refresh_token.clone())
    }

    fn user(&self) -> Option<User> {
        self.read(|s| s.user.clone())
    }

    fn set_token(&self, token: String) {
        self.write(|s| s.token = Some(token));
    }

    fn set_refresh_token(&self, refresh_token: String) {
        self.write(|s| s.refresh_token = Some(refresh_token));
    }

    fn set_user(&self, user: User) {
        self.write(|s| s.user = Some(user));
    }

    fn set_tokens(&self, token: String, refresh_token: Option<String>) {
        self.write(|s| {
            s.token = Some(token);
            if let Some(refresh_token) = refresh_token {
                s.refresh_token = Some(refresh_token);
            }
        });
    }

    fn clear(&self) {
        self.write(|s| *s = AuthState::default());
    }

    fn snapshot(&self) -> AuthState {
        self.read(|s| s.clone())
    }
}
