// End-to-end tests: connect a tenant through OAuth, then book on the right calendar

use aria::api::{create_app, AppComponents};
use aria::bookings::BookingLog;
use aria::calendar::GoogleCalendar;
use aria::config::SchedulingConfig;
use aria::credentials::SqliteCredentialStore;
use aria::default_client::DefaultCredentialHolder;
use aria::oauth::{HttpOAuthClient, OAuthProviderConfig, StateManager};
use aria::resolver::ClientResolver;
use aria::tenant::TenantCredentials;
use aria::tools::Scheduler;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TEST_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
const LEGACY_TOKEN_JSON: &str =
    r#"{"token": "legacy-access", "refresh_token": "legacy-refresh", "expiry": "2099-01-01T00:00:00Z"}"#;

struct TestApp {
    router: Router,
    provider: ServerGuard,
    calendar: ServerGuard,
}

async fn test_app(default_token_json: Option<&str>) -> TestApp {
    let provider = Server::new_async().await;
    let calendar = Server::new_async().await;

    let provider_config = OAuthProviderConfig {
        auth_url: format!("{}/o/oauth2/auth", provider.url()),
        token_url: format!("{}/token", provider.url()),
        userinfo_url: format!("{}/userinfo", provider.url()),
        scopes: vec!["calendar".to_string(), "email".to_string()],
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "http://localhost:8000/auth/callback".to_string(),
    };

    let timeout = Duration::from_secs(5);
    let oauth = Arc::new(HttpOAuthClient::new(provider_config.clone(), timeout).unwrap());
    let backend = Arc::new(GoogleCalendar::new(&calendar.url(), "primary", timeout).unwrap());
    let store = Arc::new(SqliteCredentialStore::new(":memory:", TEST_KEY).unwrap());
    let bookings = Arc::new(BookingLog::new(":memory:").unwrap());

    let tenants = Arc::new(TenantCredentials::new(store, oauth.clone(), backend.clone()));
    let holder = Arc::new(DefaultCredentialHolder::from_env_json(
        default_token_json,
        oauth,
        backend,
    ));
    let scheduler = Scheduler::new(
        ClientResolver::new(tenants, holder),
        bookings.clone(),
        SchedulingConfig::default(),
    );

    let router = create_app(AppComponents {
        scheduler,
        bookings,
        state_manager: StateManager::new(Duration::from_secs(600)),
        provider: provider_config,
        admin_token: Some("admin-secret".to_string()),
        secure_cookies: false,
    });

    TestApp {
        router,
        provider,
        calendar,
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// GET /auth/login and return the issued state from the cookie.
async fn login(router: &Router) -> String {
    let response = send(
        router,
        Request::builder().uri("/auth/login").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    cookie
        .strip_prefix("oauth_state=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string()
}

fn callback(state: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/auth/callback?code=auth-code&state={}", state))
        .header(header::COOKIE, format!("oauth_state={}", cookie))
        .body(Body::empty())
        .unwrap()
}

fn tool_call(uri: &str, arguments: Value) -> Request<Body> {
    let body = json!({
        "message": {
            "type": "tool-calls",
            "toolCalls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "tool", "arguments": arguments}
            }]
        }
    });
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn mock_provider(server: &mut ServerGuard, email: &str, hits: usize) -> (Mock, Mock) {
    let token = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("code".into(), "auth-code".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": "alice-access",
                "refresh_token": "alice-refresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })
            .to_string(),
        )
        .expect(hits)
        .create_async()
        .await;
    let userinfo = server
        .mock("GET", "/userinfo")
        .match_header("authorization", "Bearer alice-access")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"email": email, "name": "Alice"}).to_string())
        .expect(hits)
        .create_async()
        .await;
    (token, userinfo)
}

/// Calendar endpoints answering only for `bearer`: an empty window and a
/// successful insert.
async fn mock_calendar(server: &mut ServerGuard, bearer: &str, hits: usize) -> (Mock, Mock) {
    let auth = format!("Bearer {}", bearer);
    let list = server
        .mock("GET", Matcher::Regex(r"^/calendars/primary/events".to_string()))
        .match_header("authorization", auth.as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items": []}"#)
        .expect(hits)
        .create_async()
        .await;
    let insert = server
        .mock("POST", "/calendars/primary/events")
        .match_header("authorization", auth.as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "evt-1",
                "summary": "Meeting with Sam",
                "htmlLink": "https://calendar.google.com/event?eid=evt-1"
            })
            .to_string(),
        )
        .expect(hits)
        .create_async()
        .await;
    (list, insert)
}

#[tokio::test]
async fn test_connected_tenant_books_on_own_calendar() {
    let mut app = test_app(Some(LEGACY_TOKEN_JSON)).await;
    let (token_mock, userinfo_mock) = mock_provider(&mut app.provider, "Alice@Example.com", 1).await;
    let (alice_list, alice_insert) = mock_calendar(&mut app.calendar, "alice-access", 1).await;
    let (legacy_list, legacy_insert) = mock_calendar(&mut app.calendar, "legacy-access", 0).await;

    let state = login(&app.router).await;
    let response = send(&app.router, callback(&state, &state)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, json!({"success": true, "email": "alice@example.com"}));

    let response = send(
        &app.router,
        tool_call(
            "/tools/api/v1/schedule-event",
            json!({"name": "Sam", "date": "tomorrow", "time": "3pm", "user_email": "alice@example.com"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["results"][0]["toolCallId"], "call_1");
    let result = body["results"][0]["result"].as_str().unwrap();
    assert!(result.starts_with("Done! 'Meeting with Sam' is confirmed"), "{}", result);

    token_mock.assert_async().await;
    userinfo_mock.assert_async().await;
    alice_list.assert_async().await;
    alice_insert.assert_async().await;
    legacy_list.assert_async().await;
    legacy_insert.assert_async().await;

    let response = send(
        &app.router,
        Request::builder().uri("/api/bookings").body(Body::empty()).unwrap(),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["bookings"][0]["tenant_email"], "alice@example.com");
    assert_eq!(body["bookings"][0]["google_event_id"], "evt-1");
}

#[tokio::test]
async fn test_callback_replay_rejected() {
    let mut app = test_app(None).await;
    let (token_mock, _userinfo) = mock_provider(&mut app.provider, "alice@example.com", 1).await;

    let state = login(&app.router).await;
    let first = send(&app.router, callback(&state, &state)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = send(&app.router, callback(&state, &state)).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let body = json_body(replay).await;
    assert!(body["error"].as_str().unwrap().contains("CSRF"));

    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_callback_cookie_from_other_login_rejected() {
    let mut app = test_app(None).await;
    let (token_mock, _userinfo) = mock_provider(&mut app.provider, "alice@example.com", 0).await;

    let victim_state = login(&app.router).await;
    let attacker_state = login(&app.router).await;

    let response = send(&app.router, callback(&attacker_state, &victim_state)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_provider_error_rejected() {
    let app = test_app(None).await;

    let response = send(
        &app.router,
        Request::builder()
            .uri("/auth/callback?error=access_denied")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_tenant_never_falls_back_to_default() {
    let mut app = test_app(Some(LEGACY_TOKEN_JSON)).await;
    let (legacy_list, legacy_insert) = mock_calendar(&mut app.calendar, "legacy-access", 0).await;

    for uri in [
        "/tools/api/v1/schedule-event",
        "/tools/api/v1/check-availability",
    ] {
        let response = send(
            &app.router,
            tool_call(
                uri,
                json!({"name": "Sam", "date": "tomorrow", "time": "3pm", "user_email": "bob@example.com"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let result = body["results"][0]["result"].as_str().unwrap();
        assert!(
            result.contains("couldn't access the calendar for bob@example.com"),
            "{}",
            result
        );
    }

    legacy_list.assert_async().await;
    legacy_insert.assert_async().await;
}

#[tokio::test]
async fn test_request_without_identity_uses_default_calendar() {
    let mut app = test_app(Some(LEGACY_TOKEN_JSON)).await;
    let (legacy_list, legacy_insert) = mock_calendar(&mut app.calendar, "legacy-access", 1).await;

    let response = send(
        &app.router,
        tool_call(
            "/tools/api/v1/schedule-event",
            json!({"name": "Sam", "date": "tomorrow", "time": "3pm"}),
        ),
    )
    .await;
    let body = json_body(response).await;
    assert!(body["results"][0]["result"]
        .as_str()
        .unwrap()
        .starts_with("Done!"));

    legacy_list.assert_async().await;
    legacy_insert.assert_async().await;
}

#[tokio::test]
async fn test_health_and_admin_endpoints() {
    let mut app = test_app(Some(LEGACY_TOKEN_JSON)).await;
    let _provider = mock_provider(&mut app.provider, "alice@example.com", 1).await;

    let response = send(
        &app.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agent"], "Aria");
    assert_eq!(body["calendar_connected"], true);

    let state = login(&app.router).await;
    assert_eq!(send(&app.router, callback(&state, &state)).await.status(), StatusCode::OK);

    let unauthorized = send(
        &app.router,
        Request::builder().uri("/api/tenants").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app.router,
        Request::builder()
            .uri("/api/tenants")
            .header(header::AUTHORIZATION, "Bearer admin-secret")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["tenants"][0]["email"], "alice@example.com");
    assert_eq!(body["tenants"][0]["display_name"], "Alice");
    assert!(!body.to_string().contains("alice-access"));
}

#[tokio::test]
async fn test_webhook_acknowledges() {
    let app = test_app(None).await;
    let response = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/webhook/vapi")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"message": {"type": "end-of-call-report", "duration": 61}}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}
