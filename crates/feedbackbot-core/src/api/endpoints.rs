//! Typed operations for each backend endpoint the console uses.

use reqwest::Url;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::{ApiClient, ApiError, RequestDescriptor};
use crate::auth::AuthEvent;
use crate::models::{
    AuthConfig, AuthTokens, Bot, FeedbackConfig, FeedbackPage, FeedbackParams, ForgotPassword,
    Group, Tenant, User,
};

/// Partial update of a group's feedback delivery settings. Unset fields are
/// left unchanged by the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_to_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum_topic_id: Option<i64>,
}

impl ApiClient {
    // ===== Authentication =====

    /// OAuth settings for the login page
    pub async fn auth_config(&self) -> Result<AuthConfig, ApiError> {
        self.fetch(RequestDescriptor::get("/auth/config").credential_exempt())
            .await
    }

    /// Log in with email and password, then load the user record.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let descriptor = RequestDescriptor::post("/auth/login")
            .json(&json!({ "email": email, "password": password }))?
            .credential_exempt();
        let tokens: AuthTokens = self.fetch(descriptor).await?;
        self.begin_session(&tokens);

        // The token is already usable; the user record can be loaded later
        if let Err(e) = self.me().await {
            debug!(error = %e, "Could not load user after login");
        }
        Ok(tokens)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let descriptor = RequestDescriptor::post("/auth/register")
            .json(&json!({ "name": name, "email": email, "password": password }))?
            .credential_exempt();
        let tokens: AuthTokens = self.fetch(descriptor).await?;
        self.begin_session(&tokens);
        Ok(tokens)
    }

    /// Finish an OAuth login by exchanging the authorization code
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<AuthTokens, ApiError> {
        let descriptor = RequestDescriptor::post("/auth/token")
            .json(&json!({ "code": code, "redirect_uri": redirect_uri }))?
            .credential_exempt();
        let tokens: AuthTokens = self.fetch(descriptor).await?;
        self.begin_session(&tokens);
        Ok(tokens)
    }

    pub async fn forgot_password_url(&self) -> Result<String, ApiError> {
        let reply: ForgotPassword = self
            .fetch(RequestDescriptor::get("/auth/forgot-password").credential_exempt())
            .await?;
        Ok(reply.url)
    }

    /// Look up the signed-in user and remember it in the credential store
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.fetch(RequestDescriptor::get("/auth/me")).await?;
        self.store().set_user(user.clone());
        Ok(user)
    }

    pub fn logout(&self) {
        info!("Logging out");
        self.store().clear();
        self.emit(AuthEvent::LoggedOut);
    }

    /// Replace whatever session was stored with the one just issued.
    fn begin_session(&self, tokens: &AuthTokens) {
        let store = self.store();
        store.clear();
        store.set_tokens(
            tokens.access_token.clone(),
            tokens.refresh_token().map(str::to_string),
        );
        if let Some(user) = tokens.user() {
            store.set_user(user);
        }
        info!(has_refresh_token = tokens.refresh_token().is_some(), "Session started");
        self.emit(AuthEvent::LoggedIn);
    }

    // ===== Tenants =====

    pub async fn get_tenant(&self, id: u64) -> Result<Tenant, ApiError> {
        self.fetch(RequestDescriptor::get(format!("/tenants/{}", id))).await
    }

    pub async fn create_tenant(&self, name: &str, slug: &str) -> Result<Tenant, ApiError> {
        let descriptor = RequestDescriptor::post("/tenants").json(&json!({ "name": name, "slug": slug }))?;
        self.fetch(descriptor).await
    }

    // ===== Bots =====

    pub async fn get_bots(&self) -> Result<Vec<Bot>, ApiError> {
        self.fetch(RequestDescriptor::get("/bots")).await
    }

    pub async fn get_bot(&self, id: u64) -> Result<Bot, ApiError> {
        self.fetch(RequestDescriptor::get(format!("/bots/{}", id))).await
    }

    /// Register a bot by its Telegram token. The server verifies the token
    /// with Telegram before accepting it.
    pub async fn create_bot(&self, tenant_id: u64, token: &str) -> Result<Bot, ApiError> {
        let descriptor =
            RequestDescriptor::post("/bots").json(&json!({ "tenant_id": tenant_id, "token": token }))?;
        self.fetch(descriptor).await
    }

    pub async fn delete_bot(&self, id: u64) -> Result<(), ApiError> {
        self.request::<serde_json::Value>(RequestDescriptor::delete(format!("/bots/{}", id)))
            .await?;
        Ok(())
    }

    // ===== Groups =====

    pub async fn get_groups(&self, tenant_id: u64) -> Result<Vec<Group>, ApiError> {
        self.fetch(RequestDescriptor::get("/groups").query("tenant_id", tenant_id))
            .await
    }

    pub async fn update_group(&self, id: u64, is_active: bool) -> Result<Group, ApiError> {
        let descriptor =
            RequestDescriptor::patch(format!("/groups/{}", id)).json(&json!({ "is_active": is_active }))?;
        self.fetch(descriptor).await
    }

    pub async fn update_group_config(
        &self,
        group_id: u64,
        update: &FeedbackConfigUpdate,
    ) -> Result<FeedbackConfig, ApiError> {
        let descriptor = RequestDescriptor::patch(format!("/groups/{}/config", group_id)).json(update)?;
        self.fetch(descriptor).await
    }

    // ===== Feedback =====

    pub async fn get_feedbacks(&self, params: &FeedbackParams) -> Result<FeedbackPage, ApiError> {
        let descriptor = params
            .query_pairs()
            .into_iter()
            .fold(RequestDescriptor::get("/feedbacks"), |d, (key, value)| d.query(key, value));
        self.fetch(descriptor).await
    }

    /// Download link for the CSV export of the filtered feedback. No request
    /// is made; the link is opened by the user.
    pub fn export_csv_url(&self, params: &FeedbackParams) -> Result<String, ApiError> {
        let base = format!("{}/feedbacks/export", self.base_url().trim_end_matches('/'));
        let url = Url::parse_with_params(&base, params.query_pairs())
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid export URL {}: {}", base, e)))?;
        Ok(url.to_string())
    }
}
