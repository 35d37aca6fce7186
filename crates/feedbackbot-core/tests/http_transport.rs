//! HTTP-level tests of the client against a mock server.

use std::sync::Arc;

use futures::future::join_all;
use mockito::{Matcher, Server};
use serde_json::json;

use feedbackbot_core::auth::{AuthState, CredentialStore, MemoryStore};
use feedbackbot_core::models::{AdminFilter, FeedbackParams};
use feedbackbot_core::{ApiClient, ApiError, AuthEvent};

fn session(token: &str, refresh_token: Option<&str>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_state(AuthState {
        token: Some(token.to_string()),
        refresh_token: refresh_token.map(str::to_string),
        user: None,
    }))
}

fn client(server: &Server, store: Arc<MemoryStore>) -> ApiClient {
    ApiClient::new(format!("{}/api", server.url()), store).expect("client should build")
}

const ME: &str = r#"{"data":{"user_id":"7","email":"o@acme.io","name":"Owner","role":"admin"}}"#;

#[tokio::test]
async fn test_bearer_sent_and_envelope_unwrapped() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ME)
        .create_async()
        .await;

    let client = client(&server, session("t1", Some("r1")));
    let user = client.me().await.expect("me should succeed");

    m.assert_async().await;
    assert_eq!(user.id, "7");
    assert_eq!(user.display_name(), "Owner");
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer old")
        .with_status(401)
        .with_body(r#"{"data":"","message":"token expired"}"#)
        .expect(3)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/refresh")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({ "refresh_token": "r1" })))
        .with_status(200)
        .with_body(r#"{"data":{"access_token":"new","refresh_token":"r2"}}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer new")
        .with_status(200)
        .with_body(ME)
        .expect(3)
        .create_async()
        .await;

    let store = session("old", Some("r1"));
    let client = client(&server, store.clone());
    let mut events = client.subscribe();

    let results = join_all((0..3).map(|_| client.me())).await;
    for result in results {
        assert!(result.is_ok(), "request should succeed after refresh: {:?}", result.err());
    }

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(store.token().as_deref(), Some("new"));
    assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    assert_eq!(events.try_recv().ok(), Some(AuthEvent::TokenRefreshed));
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/bots")
        .with_status(401)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/refresh")
        .with_status(401)
        .with_body(r#"{"data":"","message":"refresh token revoked"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = session("old", Some("r1"));
    let client = client(&server, store.clone());
    let mut events = client.subscribe();

    let result = client.get_bots().await;

    refresh.assert_async().await;
    match result {
        Err(ApiError::RefreshFailed(inner)) => assert!(inner.is_unauthorized()),
        other => panic!("expected RefreshFailed, got {:?}", other),
    }
    assert!(store.snapshot().is_empty());
    assert_eq!(events.try_recv().ok(), Some(AuthEvent::ReauthenticationRequired));
}

#[tokio::test]
async fn test_login_is_sent_without_credentials() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({ "email": "o@acme.io", "password": "pw" })))
        .with_status(200)
        .with_body(r#"{"data":{"access_token":"a1","refresh_token":"r1","user_id":"7"}}"#)
        .create_async()
        .await;
    let me = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer a1")
        .with_status(200)
        .with_body(ME)
        .create_async()
        .await;

    let store = session("leftover", Some("leftover-refresh"));
    let client = client(&server, store.clone());
    client.login("o@acme.io", "pw").await.expect("login should succeed");

    login.assert_async().await;
    me.assert_async().await;
    assert_eq!(store.token().as_deref(), Some("a1"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert_eq!(store.user().map(|u| u.name), Some(Some("Owner".to_string())));
}

#[tokio::test]
async fn test_feedback_filters_sent_as_query() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/api/feedbacks")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("group_id".into(), "3".into()),
            Matcher::UrlEncoded("admin_only".into(), "false".into()),
            Matcher::UrlEncoded("search".into(), "late bus".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"data":{"data":[{"ID":1,"tenant_id":1,"group_id":3,"message":"The bus was late","admin_only":false,"posted":true,"CreatedAt":"2024-03-01T09:30:00Z"}],"total":21,"page":1,"limit":20}}"#,
        )
        .create_async()
        .await;

    let client = client(&server, session("t1", None));
    let params = FeedbackParams {
        admin_only: Some(AdminFilter::Public),
        search: Some("late bus".to_string()),
        ..FeedbackParams::for_group(3)
    };
    let page = client.get_feedbacks(&params).await.expect("listing should succeed");

    m.assert_async().await;
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total_pages(), 2);
    assert!(page.has_next());
}

#[tokio::test]
async fn test_error_message_taken_from_envelope() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/bots")
        .with_status(400)
        .with_body(r#"{"data":"","message":"invalid bot token"}"#)
        .create_async()
        .await;

    let client = client(&server, session("t1", None));
    let result = client.create_bot(1, "123:abc").await;

    match result {
        Err(ApiError::BadRequest(message)) => assert_eq!(message, "invalid bot token"),
        other => panic!("expected BadRequest, got {:?}", other),
    }
}
