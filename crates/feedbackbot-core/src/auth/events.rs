/// Authentication lifecycle notifications published by the API client.
///
/// The application shell subscribes to these to react to login state, most
/// importantly to send the user back to the login entry point when the
/// session can no longer be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn,
    TokenRefreshed,
    LoggedOut,
    /// The session is gone (no refresh token, or the refresh was rejected).
    /// The credential store has already been cleared.
    ReauthenticationRequired,
}
