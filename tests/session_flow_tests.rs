//! End-to-end session flows over a live server: login, principal
//! attachment, the clear-session hint, and the error channels as a client
//! sees them.

use std::sync::Arc;

use serde_json::json;

use vestibule::config::ServerConfig;
use vestibule::identity::{
    MemoryCache, MemoryUserDirectory, SessionService, SessionStore, TokenCodec,
};
use vestibule::server::api::{self, ApiState};
use vestibule::server::{HttpServer, ServerHandle};

struct TestServer {
    handle: ServerHandle,
    base: String,
    sessions: Arc<SessionService>,
    client: reqwest::Client,
}

async fn start_server() -> TestServer {
    let cache = Arc::new(MemoryCache::new());
    let sessions = Arc::new(SessionService::new(
        TokenCodec::generate().unwrap(),
        SessionStore::new(cache),
    ));
    let users = Arc::new(MemoryUserDirectory::new());
    users.add_user("u1", "Ada", "ada@example.com", "correct horse").unwrap();

    let mut config = ServerConfig::default();
    config.http_port = 0;
    let mut server = HttpServer::new(&config);
    server.merge_routes(api::router(ApiState {
        sessions: Arc::clone(&sessions),
        users,
    }));
    server.on_bootstrap(sessions.bootstrap_hook());

    let handle = server.listen().await.unwrap();
    let base = format!("http://127.0.0.1:{}", handle.local_addr().port());
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    TestServer { handle, base, sessions, client }
}

async fn login(server: &TestServer) -> String {
    let response = server
        .client
        .post(format!("{}/api/users/authenticate", server.base))
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn bearer_token_attaches_principal() {
    let server = start_server().await;
    let token = login(&server).await;

    let response = server
        .client
        .post(format!("{}/api/users/session", server.base))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("clear-session").is_none());
    let user: serde_json::Value = response.json().await.unwrap();
    assert_eq!(user["id"], "u1");
    assert_eq!(user["email"], "ada@example.com");

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn missing_header_proceeds_unauthenticated() {
    let server = start_server().await;

    let response = server
        .client
        .post(format!("{}/api/users/session", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("clear-session").is_none());
    assert!(response.bytes().await.unwrap().is_empty());

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn garbage_token_gets_no_clear_session_hint() {
    let server = start_server().await;

    let response = server
        .client
        .post(format!("{}/api/users/session", server.base))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    // Unverifiable is not stale: no hint for a token we never trusted.
    assert!(response.headers().get("clear-session").is_none());
    assert!(response.bytes().await.unwrap().is_empty());

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn invalidated_session_sets_clear_session_hint() {
    let server = start_server().await;
    let token = login(&server).await;

    let claims_sid = {
        use vestibule::identity::AuthOutcome;
        match server.sessions.authenticate(Some(&format!("Bearer {token}"))).await {
            AuthOutcome::Authenticated(p) => p.session_id,
            other => panic!("expected authenticated outcome, got {other:?}"),
        }
    };
    assert!(server.sessions.invalidate(&claims_sid).await);

    let response = server
        .client
        .post(format!("{}/api/users/session", server.base))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers().get("clear-session").unwrap(), "true");
    assert!(response.bytes().await.unwrap().is_empty());

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn logout_invalidates_and_redirects() {
    let server = start_server().await;
    let token = login(&server).await;

    let response = server
        .client
        .get(format!("{}/api/users/logout", server.base))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(response.headers().get("clear-session").unwrap(), "true");
    assert_eq!(response.headers().get("location").unwrap(), "/");

    // The token is dead from here on: next call degrades to stale.
    let response = server
        .client
        .post(format!("{}/api/users/session", server.base))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers().get("clear-session").unwrap(), "true");

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn unauthenticated_logout_is_rejected() {
    let server = start_server().await;

    let response = server
        .client
        .get(format!("{}/api/users/logout", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn validation_failure_reports_field_errors() {
    let server = start_server().await;

    let response = server
        .client
        .post(format!("{}/api/users/authenticate", server.base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    let errors = body["errors"].as_array().unwrap();
    let properties: Vec<&str> =
        errors.iter().map(|e| e["property"].as_str().unwrap()).collect();
    assert!(properties.contains(&"email"));
    assert!(properties.contains(&"password"));
    assert_eq!(errors[0]["errorName"], "isNotEmpty");

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn wrong_password_is_a_validation_failure() {
    let server = start_server().await;

    let response = server
        .client
        .post(format!("{}/api/users/authenticate", server.base))
        .json(&json!({ "email": "ada@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["errors"][0]["property"], "password");

    server.handle.close().await.unwrap();
}

#[tokio::test]
async fn unmatched_route_gets_generic_404_page() {
    let server = start_server().await;

    let response = server
        .client
        .get(format!("{}/no/such/route", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert!(response.text().await.unwrap().contains("<h1>404</h1>"));

    server.handle.close().await.unwrap();
}
