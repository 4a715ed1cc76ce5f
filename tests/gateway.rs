//! Gateway pipeline behavior against a local stub authority: credential
//! attachment, 401 eviction, error normalization, and envelope unwrapping.

mod support;

use axum::Router;
use axum::extract::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use serde_json::json;

use support::{AuthLog, gateway_for, serve, unreachable_gateway};
use tickerdesk_client::types::{
    CreateConversationRequest, FavoriteRequest, LoginRequest, RegisterRequest, SettingsUpdate, TestApiRequest,
};

// =============================================================================
// CREDENTIAL LIFECYCLE
// =============================================================================

#[tokio::test]
async fn login_stores_credential_and_next_call_attaches_bearer() {
    let log = AuthLog::default();
    let check_log = log.clone();
    let app = Router::new()
        .route(
            "/api/login",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["username"], "alice");
                Json(json!({
                    "access_token": "tok-alice",
                    "token_type": "bearer",
                    "user": { "id": 1, "username": "alice", "display_name": "Alice" }
                }))
            }),
        )
        .route(
            "/api/check_auth",
            get(move |headers: HeaderMap| {
                let log = check_log.clone();
                async move {
                    log.record(&headers);
                    Json(json!({ "authenticated": true, "username": "alice" }))
                }
            }),
        );
    let base = serve(app).await;
    let (gateway, session) = gateway_for(&base);

    let auth = gateway
        .login(&LoginRequest::with_username("alice", "hunter2"))
        .await
        .unwrap();
    assert_eq!(auth.access_token, "tok-alice");
    assert_eq!(session.credential().as_deref(), Some("tok-alice"));
    assert_eq!(auth.user.unwrap().username, "alice");

    assert!(gateway.check_auth().await.unwrap());
    assert_eq!(log.last().unwrap().as_deref(), Some("Bearer tok-alice"));
}

#[tokio::test]
async fn register_stores_credential_before_returning() {
    let app = Router::new().route(
        "/api/register",
        post(|| async { Json(json!({ "access_token": "tok-new", "token_type": "bearer" })) }),
    );
    let base = serve(app).await;
    let (gateway, session) = gateway_for(&base);

    let request = RegisterRequest {
        username: "bob".into(),
        password: "hunter2".into(),
        email: None,
        display_name: None,
    };
    gateway.register(&request).await.unwrap();
    assert_eq!(session.credential().as_deref(), Some("tok-new"));
}

#[tokio::test]
async fn unauthorized_response_evicts_credential() {
    let app = Router::new().route(
        "/api/user/profile",
        get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "please log in" }))) }),
    );
    let base = serve(app).await;
    let (gateway, session) = gateway_for(&base);
    session.store("stale-token");

    let error = gateway.user_profile().await.unwrap_err();
    assert_eq!(error.kind(), "unauthenticated");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn check_auth_false_evicts_credential() {
    let app = Router::new().route(
        "/api/check_auth",
        get(|| async { Json(json!({ "authenticated": false })) }),
    );
    let base = serve(app).await;
    let (gateway, session) = gateway_for(&base);
    session.store("expired-token");

    assert!(!gateway.check_auth().await.unwrap());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn logout_is_idempotent_and_always_evicts() {
    let app = Router::new().route("/api/logout", post(|| async { StatusCode::NO_CONTENT }));
    let base = serve(app).await;
    let (gateway, session) = gateway_for(&base);
    session.store("tok");

    gateway.logout().await;
    assert!(!session.is_authenticated());
    gateway.logout().await;
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn logout_without_reachable_authority_still_evicts() {
    let (gateway, session) = unreachable_gateway();
    session.store("tok");
    gateway.logout().await;
    assert!(!session.is_authenticated());
}

// =============================================================================
// ERROR NORMALIZATION
// =============================================================================

#[tokio::test]
async fn application_error_carries_status_and_detail() {
    let app = Router::new().route(
        "/api/user/favorites",
        post(|| async { (StatusCode::BAD_REQUEST, Json(json!({ "detail": "already favorited" }))) }),
    );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    let request = FavoriteRequest {
        stock_code: "AAPL".into(),
        market_type: "US".into(),
        display_name: None,
        tags: None,
    };
    let error = gateway.add_favorite(&request).await.unwrap_err();
    match error {
        tickerdesk_client::ApiError::Application { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "already favorited");
        }
        other => panic!("expected application error, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_normalized() {
    let (gateway, _session) = unreachable_gateway();
    let error = gateway.need_login().await.unwrap_err();
    assert_eq!(error.kind(), "transport");
}

// =============================================================================
// BUFFERED OPERATIONS
// =============================================================================

#[tokio::test]
async fn policy_and_config_queries_read_expected_fields() {
    let app = Router::new()
        .route(
            "/api/need_login",
            get(|| async { Json(json!({ "require_login": true, "user_system_enabled": true })) }),
        )
        .route(
            "/api/config",
            get(|| async {
                Json(json!({
                    "announcement": "",
                    "default_api_url": "https://api.example.com/v1",
                    "default_api_model": "gpt-4o",
                    "default_api_timeout": "60",
                    "user_system_enabled": true,
                    "require_login": true
                }))
            }),
        );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    assert!(gateway.need_login().await.unwrap());
    let config = gateway.fetch_config().await.unwrap();
    assert!(config.user_system_enabled);
    assert_eq!(config.default_api_model, "gpt-4o");
}

#[tokio::test]
async fn payload_envelopes_are_unwrapped() {
    let app = Router::new()
        .route(
            "/api/user/favorites",
            get(|| async {
                Json(json!({ "favorites": [
                    { "id": 1, "stock_code": "600519", "market_type": "A", "tags": ["baijiu"], "created_at": "2025-11-01" }
                ]}))
            }),
        )
        .route(
            "/api/user/history",
            get(|| async {
                Json(json!({ "history": [
                    { "id": 9, "stock_codes": ["AAPL"], "market_type": "US", "analysis_days": 30, "created_at": "2025-11-01" }
                ]}))
            }),
        )
        .route("/api/user/settings", get(|| async { Json(json!({ "settings": {} })) }))
        .route(
            "/api/search_us_stocks",
            get(|| async {
                Json(json!({ "results": [ { "symbol": "AAPL", "name": "Apple Inc", "market": "US" } ] }))
            }),
        )
        .route(
            "/api/conversations",
            get(|| async {
                Json(json!({ "conversations": [
                    { "id": 7, "history_id": 9, "title": "AAPL deep dive", "message_count": 4 }
                ]}))
            }),
        )
        .route(
            "/api/conversations/prompts/random",
            get(|| async { Json(json!({ "prompt": "What drove the recent move?" })) }),
        );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    let favorites = gateway.favorites().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].stock_code, "600519");

    let history = gateway.analysis_history(50).await.unwrap();
    assert_eq!(history[0].analysis_days, 30);

    let settings = gateway.settings().await.unwrap();
    assert_eq!(settings.default_market_type, "");

    let results = gateway.search_us_stocks("apple").await.unwrap();
    assert_eq!(results[0].symbol, "AAPL");

    let conversations = gateway.conversations(Some(9)).await.unwrap();
    assert_eq!(conversations[0].id, 7);

    let prompt = gateway.random_prompt().await.unwrap();
    assert!(prompt.contains("recent move"));
}

#[tokio::test]
async fn conversation_create_and_delete_round_trip() {
    let app = Router::new()
        .route(
            "/api/conversations",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["history_id"], 9);
                Json(json!({ "conversation_id": 42, "message": "created" }))
            }),
        )
        .route(
            "/api/conversations/42",
            delete(|| async { Json(json!({ "message": "deleted" })) }),
        );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    let request = CreateConversationRequest { history_id: 9, title: Some("AAPL deep dive".into()) };
    let id = gateway.create_conversation(&request).await.unwrap();
    assert_eq!(id, 42);
    assert_eq!(gateway.delete_conversation(id).await.unwrap(), "deleted");
}

#[tokio::test]
async fn settings_update_returns_server_message() {
    let app = Router::new().route(
        "/api/user/settings",
        put(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["default_market_type"], "HK");
            Json(json!({ "message": "settings saved" }))
        }),
    );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    let update = SettingsUpdate { default_market_type: Some("HK".into()), ..SettingsUpdate::default() };
    assert_eq!(gateway.update_settings(&update).await.unwrap(), "settings saved");
}

#[tokio::test]
async fn test_api_connection_parses_probe_result() {
    let app = Router::new().route(
        "/api/test_api_connection",
        post(|| async { Json(json!({ "success": true, "message": "ok", "status_code": 200 })) }),
    );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    let request = TestApiRequest {
        api_url: "https://api.example.com/v1".into(),
        api_key: "sk-test".into(),
        api_model: None,
        api_timeout: Some(10),
    };
    let probe = gateway.test_api_connection(&request).await.unwrap();
    assert!(probe.success);
    assert_eq!(probe.status_code, Some(200));
}

#[tokio::test]
async fn remove_favorite_sends_market_type_query() {
    let app = Router::new().route(
        "/api/user/favorites/AAPL",
        delete(
            |axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>| async move {
                assert_eq!(params.get("market_type").map(String::as_str), Some("US"));
                Json(json!({ "message": "removed" }))
            },
        ),
    );
    let base = serve(app).await;
    let (gateway, _session) = gateway_for(&base);

    assert_eq!(gateway.remove_favorite("AAPL", "US").await.unwrap(), "removed");
}
