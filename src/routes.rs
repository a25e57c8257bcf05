//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Generates X-Request-Id, echoed on the response
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   CORS / Limits  │ ← Cross-origin headers, body limit, request deadline
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    No-Store      │ ← Login and admin responses only
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Admission / Auth │ ← 429 on /api/login, 401 on /api/admin/*
//! └────────┬─────────┘
//!          ▼
//!      Handler        ← Cacheable reads answer 304 on a fingerprint match
//! ```
//!
//! # Route Groups
//!
//! - `/health` - Liveness
//! - `/api/languages`, `/api/static` - Public, cacheable
//! - `/api/login` - Admission-checked
//! - `/api/admin/*` - Bearer-token protected

use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{StatusCode, header};
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{self, AdmissionLayer, BearerAuthLayer};
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // Sensitive routes: admission-checked login, bearer-protected admin
    // =========================================================================
    let login = Router::new()
        .route("/login", post(handlers::login))
        .route_layer(AdmissionLayer::new(
            state.admission.clone(),
            state.trusted_proxies.clone(),
        ));
    info!(
        limit = state.admission.limit(),
        window_secs = state.admission.window().as_secs(),
        trusted_proxies = config.trusted_proxies.len(),
        "Login admission control enabled"
    );

    let admin = Router::new()
        .route("/profile", get(handlers::profile))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route("/change-password", post(handlers::change_password))
        .route(
            "/languages",
            get(handlers::admin_languages).post(handlers::create_language),
        )
        .route(
            "/languages/{code}",
            put(handlers::update_language).delete(handlers::delete_language),
        )
        .route(
            "/static",
            get(handlers::admin_static_content).post(handlers::create_translation),
        )
        .route(
            "/static/{property}",
            get(handlers::admin_static_property)
                .put(handlers::update_translation)
                .delete(handlers::delete_property),
        )
        .route_layer(BearerAuthLayer::new(state.tokens.clone()));

    let sensitive = login
        .nest("/admin", admin)
        .layer(axum::middleware::map_response(middleware::no_store));

    // =========================================================================
    // Public routes
    // =========================================================================
    let api = Router::new()
        .route("/languages", get(handlers::languages))
        .route("/static", get(handlers::static_content))
        .merge(sensitive);

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api);

    // =========================================================================
    // Apply Middleware Stack (order matters - last added runs first)
    // =========================================================================

    // 1. Request body size limit
    info!(
        max_size_kb = config.max_request_body_size / 1024,
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 2. Overall request deadline (408 when exceeded)
    router = router.layer(request_deadline(config.request_timeout));

    // 3. CORS
    router = router.layer(build_cors_layer(&config.cors_allowed_origins));

    // 4. Echo the request id on the response
    router = router.layer(PropagateRequestIdLayer::x_request_id());

    // 5. Tracing, with the request id on every span
    router = router.layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }));

    // 6. Request ID generation - runs first so tracing can see it
    router = router.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    router.with_state(state)
}

/// Deadline for a whole request; answers 408 when exceeded.
fn request_deadline(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Build CORS layer from configuration.
///
/// `*` allows any origin; that is convenient for development but should be
/// avoided in production. `ETag` and `Retry-After` are exposed so browser
/// clients can read them.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    let layer = if allow_any {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::ETAG, header::RETRY_AFTER])
}
