//! Bearer token authentication for protected routes.
//!
//! # Flow
//!
//! 1. Read `Authorization: Bearer <token>`
//! 2. Verify the token with the shared [`TokenCodec`]
//! 3. Insert the verified [`SessionClaims`] into the request extensions
//!
//! Handlers read the identity through the [`AuthUser`] extractor.
//!
//! # Uniform Failures
//!
//! A missing header, a non-Bearer scheme, an empty token, a bad signature,
//! an expired token and a foreign algorithm all produce the same
//! `401 Unauthorized` body. The specific [`AuthFailure`] is only logged and
//! counted, so clients cannot use the response as an oracle.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response, header};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::metrics;
use crate::token::{SessionClaims, TokenCodec, TokenError};

/// Authorization scheme prefix, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    InvalidScheme,
    MissingToken,
    Token(TokenError),
}

impl AuthFailure {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "missing_header",
            AuthFailure::InvalidScheme => "invalid_scheme",
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::Token(err) => err.as_str(),
        }
    }
}

/// Extract the bearer token from `headers`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?
        .to_str()
        .map_err(|_| AuthFailure::InvalidScheme)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthFailure::InvalidScheme)?
        .trim();

    if token.is_empty() {
        return Err(AuthFailure::MissingToken);
    }
    Ok(token)
}

/// Verify the bearer credentials carried by `headers`.
pub fn authenticate(codec: &TokenCodec, headers: &HeaderMap) -> Result<SessionClaims, AuthFailure> {
    let token = bearer_token(headers)?;
    codec.verify(token).map_err(AuthFailure::Token)
}

/// Bearer authentication layer.
///
/// Apply with `route_layer` so unknown paths still answer 404 rather than 401.
#[derive(Clone)]
pub struct BearerAuthLayer {
    codec: Arc<TokenCodec>,
}

impl BearerAuthLayer {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            codec: self.codec.clone(),
        }
    }
}

/// Bearer authentication service wrapper.
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    codec: Arc<TokenCodec>,
}

impl<S> Service<Request<Body>> for BearerAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let verdict = authenticate(&self.codec, req.headers());

        Box::pin(async move {
            match verdict {
                Ok(claims) => {
                    debug!(user_id = claims.user_id, "Bearer authentication successful");
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(failure) => {
                    warn!(
                        path = %req.uri().path(),
                        reason = failure.as_str(),
                        "Bearer authentication failed"
                    );
                    metrics::record_auth_failure(failure.as_str());
                    Ok(AppError::Unauthorized.into_response())
                }
            }
        })
    }
}

/// Verified identity of the caller on a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::token::Identity;
    use axum::Router;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            b"middleware-test-secret-0123456789abcdef",
            Duration::from_secs(3600),
        ))
    }

    fn identity() -> Identity {
        Identity {
            user_id: 7,
            name: "Rita".to_string(),
            email: "rita@example.com".to_string(),
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthFailure::MissingHeader)
        );
        assert_eq!(
            bearer_token(&headers_with("Basic dXNlcjpwYXNz")),
            Err(AuthFailure::InvalidScheme)
        );
        assert_eq!(
            bearer_token(&headers_with("bearer abc")),
            Err(AuthFailure::InvalidScheme)
        );
        assert_eq!(
            bearer_token(&headers_with("Bearer    ")),
            Err(AuthFailure::MissingToken)
        );
    }

    #[test]
    fn test_authenticate_classifies_token_failures() {
        let codec = codec();
        let expired = codec
            .issue_at(
                &identity(),
                false,
                Duration::from_secs(60),
                Utc::now().timestamp() - 120,
            )
            .unwrap();
        assert_eq!(
            authenticate(&codec, &headers_with(&format!("Bearer {expired}"))),
            Err(AuthFailure::Token(TokenError::Expired))
        );

        let foreign = TokenCodec::new(b"another-secret", Duration::from_secs(60))
            .issue(&identity(), false)
            .unwrap();
        assert_eq!(
            authenticate(&codec, &headers_with(&format!("Bearer {foreign}"))),
            Err(AuthFailure::Token(TokenError::BadSignature))
        );

        let valid = codec.issue(&identity(), true).unwrap();
        let claims = authenticate(&codec, &headers_with(&format!("Bearer {valid}"))).unwrap();
        assert_eq!(claims.identity(), identity());
        assert!(claims.needs_password_update);
    }

    fn protected_router(codec: Arc<TokenCodec>, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/me",
                get(move |AuthUser(claims): AuthUser| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        claims.email
                    }
                }),
            )
            .route_layer(BearerAuthLayer::new(codec))
    }

    #[tokio::test]
    async fn test_failures_share_one_response_and_skip_handler() {
        let codec = codec();
        let hits = Arc::new(AtomicUsize::new(0));
        let router = protected_router(codec.clone(), hits.clone());

        let expired = codec
            .issue_with_ttl(&identity(), false, Duration::ZERO)
            .unwrap();
        let candidates = [
            None,
            Some("Basic abc".to_string()),
            Some("Bearer ".to_string()),
            Some("Bearer not-a-token".to_string()),
            Some(format!("Bearer {expired}")),
        ];

        let mut bodies = Vec::new();
        for candidate in candidates {
            let mut builder = Request::builder().uri("/me");
            if let Some(value) = candidate {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let response = router
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            bodies.push(body);
        }

        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_token_exposes_identity() {
        let codec = codec();
        let hits = Arc::new(AtomicUsize::new(0));
        let router = protected_router(codec.clone(), hits.clone());
        let token = codec.issue(&identity(), false).unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"rita@example.com");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
