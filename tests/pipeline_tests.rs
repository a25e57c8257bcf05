//! End-to-end tests of the request pipeline, driven in-process.
//!
//! The full router is exercised with `tower::ServiceExt::oneshot`, so every
//! layer (admission, bearer auth, no-store, conditional responses) runs
//! exactly as in production, without a socket.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use site_backend::middleware::headers::NO_STORE;
use site_backend::{AppState, Config, Identity, build_router};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "initial-password";

fn test_config() -> Config {
    Config {
        jwt_secret: "pipeline-test-secret-pipeline-test".to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        // Minimum argon2 cost keeps the tests fast
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        ..Config::default()
    }
}

async fn app_with(config: Config) -> (AppState, Router) {
    let state = AppState::new(config).unwrap();
    state.seed_admin().await.unwrap();
    let router = build_router(state.clone());
    (state, router)
}

async fn app() -> (AppState, Router) {
    app_with(test_config()).await
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-real-ip", "198.51.100.10");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn login_request(email: &str, password: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-real-ip", client_ip)
        .body(Body::from(
            json!({ "email": email, "password": password }).to_string(),
        ))
        .unwrap()
}

async fn login(router: &Router, password: &str) -> Value {
    let response = send(router, login_request(ADMIN_EMAIL, password, "198.51.100.1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// =============================================================================
// Bearer authentication
// =============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (_, router) = app().await;

        let response = send(&router, get("/api/admin/profile", None)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_STORE);
        let body = body_json(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let (state, router) = app().await;
        let admin = state.users.find_by_email(ADMIN_EMAIL).await.unwrap();
        let two_hours_ago = Utc::now().timestamp() - 7200;
        let token = state
            .tokens
            .issue_at(&admin.identity(), false, Duration::from_secs(3600), two_hours_ago)
            .unwrap();

        let response = send(&router, get("/api/admin/profile", Some(&token))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_failure_kinds_are_indistinguishable() {
        let (_, router) = app().await;
        let foreign = site_backend::TokenCodec::new(b"some-other-secret", Duration::from_secs(60))
            .issue(
                &Identity {
                    user_id: 1,
                    name: "Mallory".to_string(),
                    email: ADMIN_EMAIL.to_string(),
                },
                false,
            )
            .unwrap();

        let mut bodies = Vec::new();
        for authorization in [
            "Basic YWRtaW46YWRtaW4=".to_string(),
            "Bearer ".to_string(),
            "Bearer not.a.token".to_string(),
            format!("Bearer {foreign}"),
        ] {
            let request = Request::builder()
                .uri("/api/admin/profile")
                .header(header::AUTHORIZATION, authorization)
                .body(Body::empty())
                .unwrap();
            let response = send(&router, request).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(body_json(response).await);
        }

        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn test_valid_token_exposes_identity_to_handler() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(&router, get("/api/admin/profile", Some(token))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_STORE);
        let body = body_json(response).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["data"]["email"], ADMIN_EMAIL);
        assert_eq!(body["data"]["name"], "Administrator");
        assert_eq!(body["data"]["needs_password_update"], true);
    }
}

// =============================================================================
// Login
// =============================================================================

mod login_flow {
    use super::*;

    #[tokio::test]
    async fn test_login_returns_token_and_user() {
        let (state, router) = app().await;

        let response = send(
            &router,
            login_request(ADMIN_EMAIL, ADMIN_PASSWORD, "198.51.100.2"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_STORE);
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");

        let body = body_json(response).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["user"]["email"], ADMIN_EMAIL);
        assert_eq!(body["needs_password_update"], true);

        let claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.email, ADMIN_EMAIL);
        assert!(claims.needs_password_update);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_identical() {
        let (_, router) = app().await;

        let wrong_password = send(
            &router,
            login_request(ADMIN_EMAIL, "not-the-password", "198.51.100.3"),
        )
        .await;
        let unknown_email = send(
            &router,
            login_request("nobody@example.com", ADMIN_PASSWORD, "198.51.100.3"),
        )
        .await;

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        let wrong_password = body_json(wrong_password).await;
        assert_eq!(wrong_password, body_json(unknown_email).await);
        assert_eq!(wrong_password["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_missing_fields_are_reported_together() {
        let (_, router) = app().await;

        let response = send(
            &router,
            json_request(Method::POST, "/api/login", None, json!({})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"]["email"][0], "Email is required");
        assert_eq!(body["errors"]["password"][0], "Password is required");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (_, router) = app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-real-ip", "198.51.100.10")
            .body(Body::from("{\"email\":"))
            .unwrap();

        let response = send(&router, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Malformed JSON in request body");
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_bad_request() {
        let (_, router) = app().await;

        let response = send(
            &router,
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": 42, "password": "x" }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["message"], "Invalid data in request body");
    }
}

// =============================================================================
// Admission control
// =============================================================================

mod admission {
    use super::*;

    /// Attempts use an unknown email so no password hashing runs while the
    /// clock is paused.
    #[tokio::test(start_paused = true)]
    async fn test_sixth_attempt_throttled_until_window_passes() {
        let state = AppState::new(test_config()).unwrap();
        let router = build_router(state.clone());
        let attempt = || login_request("ghost@example.com", "whatever", "203.0.113.50");

        for _ in 0..5 {
            let response = send(&router, attempt()).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let throttled = send(&router, attempt()).await;
        assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = throttled.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=900).contains(&retry_after));
        assert_eq!(throttled.headers()["x-ratelimit-limit"], "5");
        assert_eq!(throttled.headers()[header::CACHE_CONTROL], NO_STORE);

        // Another client is unaffected
        let other = send(
            &router,
            login_request("ghost@example.com", "whatever", "203.0.113.51"),
        )
        .await;
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED);

        tokio::time::advance(Duration::from_secs(901)).await;

        // Reaches the handler again: credentials are checked, not throttled
        let response = send(&router, attempt()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_credentials");
        assert_eq!(state.admission.count_for("203.0.113.50"), Some(1));
    }

    #[tokio::test]
    async fn test_admission_applies_only_to_login() {
        let config = Config {
            login_rate_limit: 1,
            ..test_config()
        };
        let (_, router) = app_with(config).await;

        for _ in 0..3 {
            let response = send(&router, get("/api/static", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}

// =============================================================================
// Password change
// =============================================================================

mod password_change {
    use super::*;

    fn change(token: &str, current: &str, new: &str) -> Request<Body> {
        json_request(
            Method::POST,
            "/api/admin/change-password",
            Some(token),
            json!({ "current_password": current, "new_password": new }),
        )
    }

    #[tokio::test]
    async fn test_short_new_password_rejected() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(&router, change(token, ADMIN_PASSWORD, "short")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["errors"]["new_password"][0],
            "Password must be at least 8 characters"
        );
    }

    #[tokio::test]
    async fn test_wrong_current_password_rejected() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(&router, change(token, "guessing-wrong", "brand-new-password")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Current password is incorrect");
    }

    #[tokio::test]
    async fn test_change_clears_flag_everywhere() {
        let (state, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let old_token = session["token"].as_str().unwrap().to_string();

        let response = send(
            &router,
            change(&old_token, ADMIN_PASSWORD, "brand-new-password"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["needs_password_update"], false);
        let new_claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
        assert!(!new_claims.needs_password_update);

        // The old token still carries the flag, but the stored value wins
        let profile = body_json(send(&router, get("/api/admin/profile", Some(&old_token))).await).await;
        assert_eq!(profile["data"]["needs_password_update"], false);

        let refreshed = send(
            &router,
            json_request(Method::POST, "/api/admin/refresh", Some(&old_token), json!({})),
        )
        .await;
        let refreshed = body_json(refreshed).await;
        assert_eq!(refreshed["needs_password_update"], false);
        assert!(refreshed.get("user").is_none());

        // Old password no longer works, new one does
        let stale = send(
            &router,
            login_request(ADMIN_EMAIL, ADMIN_PASSWORD, "198.51.100.4"),
        )
        .await;
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
        let fresh = login(&router, "brand-new-password").await;
        assert_eq!(fresh["needs_password_update"], false);
    }

    #[tokio::test]
    async fn test_logout_acknowledges() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(
            &router,
            json_request(Method::POST, "/api/admin/logout", Some(token), json!({})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Logged out successfully");
    }
}

// =============================================================================
// Conditional responses
// =============================================================================

mod conditional {
    use super::*;

    fn with_if_none_match(uri: &str, tag: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::IF_NONE_MATCH, tag)
            .body(Body::empty())
            .unwrap()
    }

    async fn etag_of(router: &Router, uri: &str) -> String {
        let response = send(router, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        response.headers()[header::ETAG].to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_matching_fingerprint_is_not_modified() {
        let (_, router) = app().await;

        let first = send(&router, get("/api/static", None)).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            first.headers()[header::VARY],
            "Accept-Language, Accept-Encoding"
        );
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_string();
        let body = body_json(first).await;
        assert_eq!(body["status"], true);

        let second = send(&router, with_if_none_match("/api/static", &etag)).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(second.headers()[header::ETAG], etag.as_str());
        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());

        let weak = send(
            &router,
            with_if_none_match("/api/static", &format!("W/{etag}")),
        )
        .await;
        assert_eq!(weak.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_fingerprint_stable_across_instances() {
        let (_, first) = app().await;
        let (_, second) = app().await;

        assert_eq!(
            etag_of(&first, "/api/static").await,
            etag_of(&second, "/api/static").await
        );
        assert_eq!(
            etag_of(&first, "/api/languages").await,
            etag_of(&second, "/api/languages").await
        );
    }

    #[tokio::test]
    async fn test_update_changes_fingerprint() {
        let (_, router) = app().await;
        let before = etag_of(&router, "/api/static").await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(
            &router,
            json_request(
                Method::PUT,
                "/api/admin/static/home.title",
                Some(token),
                json!({ "lang_code": "en", "content": "Upcoming events" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stale = send(&router, with_if_none_match("/api/static", &before)).await;
        assert_eq!(stale.status(), StatusCode::OK);
        assert_ne!(stale.headers()[header::ETAG], before.as_str());
        let body = body_json(stale).await;
        let home = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["property"] == "home.title")
            .unwrap();
        assert_eq!(home["contents"][0]["content"], "Upcoming events");
    }

    #[tokio::test]
    async fn test_public_languages_hide_inactive() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let created = send(
            &router,
            json_request(
                Method::POST,
                "/api/admin/languages",
                Some(token),
                json!({ "code": "fr", "name": "Français", "active": false }),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let body = body_json(send(&router, get("/api/languages", None)).await).await;
        let codes: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|lang| lang["code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["en", "nl"]);

        let admin = body_json(send(&router, get("/api/admin/languages", Some(token))).await).await;
        assert_eq!(admin["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_language_update_changes_fingerprint() {
        let (_, router) = app().await;
        let before = etag_of(&router, "/api/languages").await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(
            &router,
            json_request(
                Method::PUT,
                "/api/admin/languages/nl",
                Some(token),
                json!({ "name": "Dutch", "flag_url": "/flags/nl.svg", "active": true }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stale = send(&router, with_if_none_match("/api/languages", &before)).await;
        assert_eq!(stale.status(), StatusCode::OK);
        let after = stale.headers()[header::ETAG].to_str().unwrap().to_string();
        assert_ne!(after, before);
        let body = body_json(stale).await;
        assert_eq!(body["data"][1]["name"], "Dutch");
        assert_eq!(body["data"][1]["flag_url"], "/flags/nl.svg");

        let fresh = send(&router, with_if_none_match("/api/languages", &after)).await;
        assert_eq!(fresh.status(), StatusCode::NOT_MODIFIED);
    }
}

// =============================================================================
// Static content administration
// =============================================================================

mod static_admin {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete_translation() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();
        let create = |lang: &str| {
            json_request(
                Method::POST,
                "/api/admin/static",
                Some(token),
                json!({ "property": "about.intro", "lang_code": lang, "content": "About us" }),
            )
        };

        let created = send(&router, create("en")).await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let duplicate = send(&router, create("en")).await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let unknown_language = send(&router, create("de")).await;
        assert_eq!(unknown_language.status(), StatusCode::BAD_REQUEST);
        let body = body_json(unknown_language).await;
        assert!(body["errors"]["lang_code"].is_array());

        let fetched = send(&router, get("/api/admin/static/about.intro", Some(token))).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        let body = body_json(fetched).await;
        assert_eq!(body["data"]["contents"][0]["lang_code"], "en");

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/api/admin/static/about.intro")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&router, delete).await.status(), StatusCode::OK);

        let gone = send(&router, get("/api/admin/static/about.intro", Some(token))).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_property_rejected() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();

        let response = send(
            &router,
            json_request(
                Method::POST,
                "/api/admin/static",
                Some(token),
                json!({ "property": "..", "lang_code": "en", "content": "x" }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["errors"]["property"].is_array());
    }

    #[tokio::test]
    async fn test_language_admin_rules() {
        let (_, router) = app().await;
        let session = login(&router, ADMIN_PASSWORD).await;
        let token = session["token"].as_str().unwrap();
        let create = |code: &str, name: &str| {
            json_request(
                Method::POST,
                "/api/admin/languages",
                Some(token),
                json!({ "code": code, "name": name, "active": true }),
            )
        };

        assert_eq!(
            send(&router, create("nl", "Nederlands")).await.status(),
            StatusCode::CONFLICT
        );

        let bad_code = send(&router, create("Dutch", "Nederlands")).await;
        assert_eq!(bad_code.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(bad_code).await["errors"]["lang_code"].is_array());

        let blank_name = send(&router, create("de", " ")).await;
        assert_eq!(blank_name.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(blank_name).await["errors"]["name"].is_array());

        let missing = send(
            &router,
            json_request(
                Method::PUT,
                "/api/admin/languages/de",
                Some(token),
                json!({ "name": "Deutsch", "active": true }),
            ),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/api/admin/languages/nl")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&router, delete).await.status(), StatusCode::OK);

        // Dutch translations go with the language
        let title = body_json(send(&router, get("/api/admin/static/home.title", Some(token))).await).await;
        let langs: Vec<&str> = title["data"]["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["lang_code"].as_str().unwrap())
            .collect();
        assert_eq!(langs, vec!["en"]);
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_tracked_clients() {
    let (_, router) = app().await;
    login(&router, ADMIN_PASSWORD).await;

    let response = send(&router, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tracked_clients"], 1);
}
