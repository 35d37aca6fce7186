//! Single-flight access token refresh.
//!
//! When a request comes back 401 the client asks the [`RefreshCoordinator`]
//! for a fresh token. The first caller to find the coordinator idle starts a
//! refresh cycle; everyone arriving while it runs is queued behind it. The
//! cycle's outcome is written to the credential store before any waiter is
//! released, and waiters are released in arrival order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::{AuthEvent, CredentialStore};
use crate::models::TokenPair;

type RefreshOutcome = Result<(), Arc<ApiError>>;

type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: VecDeque<Waiter>,
    },
}

/// What a caller that hit a 401 should do next.
enum Admission {
    /// The store already holds a newer token than the one that was rejected.
    Retry,
    /// Nothing to refresh with; the session is over.
    NoRefreshToken,
    /// The session already ended (a failed cycle or a logout) after this
    /// request was sent.
    AlreadyEnded,
    /// A cycle is running; wait for it.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// This caller starts the cycle.
    Start {
        refresh_token: String,
        rx: oneshot::Receiver<RefreshOutcome>,
    },
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<dyn CredentialStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, events: broadcast::Sender<AuthEvent>) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            store,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the running cycle.
    pub fn queued(&self) -> usize {
        match &*self.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Wait until the store holds a token newer than `rejected`.
    ///
    /// `exchange` is only called if this caller starts a new cycle; it runs
    /// on its own task so that dropping the caller does not strand the
    /// queue. Returns `SessionExpired` when there is no refresh token and
    /// `RefreshFailed` when the exchange was rejected.
    pub async fn await_fresh_token<F, Fut>(
        self: &Arc<Self>,
        rejected: Option<&str>,
        exchange: F,
    ) -> Result<(), ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenPair, ApiError>> + Send + 'static,
    {
        let rx = match self.admit(rejected) {
            Admission::Retry => {
                debug!("Token already refreshed, retrying directly");
                return Ok(());
            }
            Admission::NoRefreshToken => {
                info!("Access token rejected and no refresh token available");
                self.end_session();
                return Err(ApiError::SessionExpired);
            }
            Admission::AlreadyEnded => {
                debug!("Session ended while the request was in flight");
                return Err(ApiError::SessionExpired);
            }
            Admission::Wait(rx) => rx,
            Admission::Start { refresh_token, rx } => {
                info!("Access token rejected, starting token refresh");
                let exchange = exchange(refresh_token);
                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = exchange.await;
                    coordinator.finish(outcome);
                });
                rx
            }
        };

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ApiError::RefreshFailed(e)),
            // The refresh task went away without reporting (runtime shutdown)
            Err(_) => Err(ApiError::Cancelled),
        }
    }

    fn admit(&self, rejected: Option<&str>) -> Admission {
        let mut state = self.lock();
        let (tx, rx) = oneshot::channel();

        if let RefreshState::Refreshing { waiters } = &mut *state {
            waiters.push_back(tx);
            debug!(queued = waiters.len(), "Refresh in progress, request queued");
            return Admission::Wait(rx);
        }

        let current = self.store.token();
        match (current.as_deref(), rejected) {
            (Some(current), _) if Some(current) != rejected => return Admission::Retry,
            (None, Some(_)) => return Admission::AlreadyEnded,
            _ => {}
        }

        match self.store.refresh_token() {
            None => Admission::NoRefreshToken,
            Some(refresh_token) => {
                *state = RefreshState::Refreshing {
                    waiters: VecDeque::from([tx]),
                };
                Admission::Start { refresh_token, rx }
            }
        }
    }

    /// Record the outcome of a cycle and release everyone queued on it.
    fn finish(&self, outcome: Result<TokenPair, ApiError>) {
        let outcome: RefreshOutcome = match outcome {
            Ok(pair) => {
                let rotated = pair.refresh_token.filter(|t| !t.is_empty());
                debug!(rotated = rotated.is_some(), "Token refresh succeeded");
                self.store.set_tokens(pair.access_token, rotated);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.end_session();
                Err(Arc::new(e))
            }
        };

        let waiters = match std::mem::take(&mut *self.lock()) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };

        if outcome.is_ok() {
            let _ = self.events.send(AuthEvent::TokenRefreshed);
        }

        info!(released = waiters.len(), ok = outcome.is_ok(), "Refresh cycle finished");
        for waiter in waiters {
            // A waiter whose request was dropped no longer cares
            let _ = waiter.send(outcome.clone());
        }
    }

    fn end_session(&self) {
        self.store.clear();
        let _ = self.events.send(AuthEvent::ReauthenticationRequired);
    }
}
