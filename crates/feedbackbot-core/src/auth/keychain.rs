use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

use super::store::{AuthState, CredentialStore, MemoryStore};
use crate::models::User;

const SERVICE_NAME: &str = "feedbackbot";

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// OS keychain entries for one console host.
#[derive(Debug, Clone)]
pub struct Keychain {
    host: String,
}

impl Keychain {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}/{}", self.host, key))
            .context("Failed to create keyring entry")
    }

    /// Store a secret in the OS keychain
    pub fn store(&self, key: &str, secret: &str) -> Result<()> {
        self.entry(key)?
            .set_password(secret)
            .context("Failed to store secret in keychain")
    }

    /// Retrieve a secret, `None` if nothing is stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve secret from keychain"),
        }
    }

    /// Delete a secret. Deleting a missing entry succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete secret from keychain"),
        }
    }
}

/// Credential store that keeps tokens in memory and mirrors them to the
/// OS keychain so a later process can pick the session back up.
///
/// The user record is not persisted; it is fetched again with `me()`.
pub struct PersistentStore {
    memory: MemoryStore,
    keychain: Keychain,
}

impl PersistentStore {
    /// Load any tokens saved by a previous run.
    pub fn hydrate(keychain: Keychain) -> Result<Self> {
        let token = keychain.get(ACCESS_TOKEN_KEY)?;
        let refresh_token = keychain.get(REFRESH_TOKEN_KEY)?;
        debug!(
            has_token = token.is_some(),
            has_refresh_token = refresh_token.is_some(),
            "Credential store hydrated from keychain"
        );

        Ok(Self {
            memory: MemoryStore::with_state(AuthState {
                token,
                refresh_token,
                user: None,
            }),
            keychain,
        })
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.keychain.store(key, value) {
            warn!(error = %e, key, "Failed to persist credential");
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.keychain.delete(key) {
            warn!(error = %e, key, "Failed to remove persisted credential");
        }
    }
}

impl CredentialStore for PersistentStore {
    fn token(&self) -> Option<String> {
        self.memory.token()
    }

    fn refresh_token(&self) -> Option<String> {
        self.memory.refresh_token()
    }

    fn user(&self) -> Option<User> {
        self.memory.user()
    }

    fn set_token(&self, token: String) {
        self.persist(ACCESS_TOKEN_KEY, &token);
        self.memory.set_token(token);
    }

    fn set_refresh_token(&self, refresh_token: String) {
        self.persist(REFRESH_TOKEN_KEY, &refresh_token);
        self.memory.set_refresh_token(refresh_token);
    }

    fn set_user(&self, user: User) {
        self.memory.set_user(user);
    }

    fn set_tokens(&self, token: String, refresh_token: Option<String>) {
        self.persist(ACCESS_TOKEN_KEY, &token);
        if let Some(ref refresh_token) = refresh_token {
            self.persist(REFRESH_TOKEN_KEY, refresh_token);
        }
        self.memory.set_tokens(token, refresh_token);
    }

    fn clear(&self) {
        self.memory.clear();
        self.forget(ACCESS_TOKEN_KEY);
        self.forget(REFRESH_TOKEN_KEY);
    }

    fn snapshot(&self) -> AuthState {
        self.memory.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keychain backed by keyring's in-process mock. Mock entries do not share
    /// storage, so every lookup starts out empty.
    fn mock_keychain() -> Keychain {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        Keychain::new("feedbackbot.test")
    }

    #[test]
    fn test_missing_entry_reads_as_none() {
        let keychain = mock_keychain();
        assert_eq!(keychain.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_deleting_missing_entry_succeeds() {
        let keychain = mock_keychain();
        keychain.delete(REFRESH_TOKEN_KEY).unwrap();
        keychain.delete(REFRESH_TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_store_accepts_secret() {
        let keychain = mock_keychain();
        keychain.store(ACCESS_TOKEN_KEY, "t1").unwrap();
    }

    #[test]
    fn test_hydrate_without_saved_session() {
        let store = PersistentStore::hydrate(mock_keychain()).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_write_through_keeps_memory_state() {
        let store = PersistentStore::hydrate(mock_keychain()).unwrap();

        store.set_tokens("t1".to_string(), Some("r1".to_string()));
        assert_eq!(store.token().as_deref(), Some("t1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        // No rotated refresh token keeps the stored one
        store.set_tokens("t2".to_string(), None);
        assert_eq!(store.token().as_deref(), Some("t2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        store.set_refresh_token("r2".to_string());
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = PersistentStore::hydrate(mock_keychain()).unwrap();
        store.set_token("t1".to_string());
        store.set_user(User {
            id: "7".to_string(),
            tenant_id: Some(1),
            email: None,
            name: Some("Owner".to_string()),
            role: None,
        });

        store.clear();
        assert!(store.snapshot().is_empty());
        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
