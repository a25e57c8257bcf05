//! Admission control for sensitive routes (login).
//!
//! Wraps an [`AdmissionController`] as a Tower layer. Every request is
//! counted against its client key before the handler runs; a rejected
//! request never reaches the handler. A request with no client key at all
//! is answered 400 without being counted.
//!
//! # Response Headers
//!
//! On rejection (429):
//! - `Retry-After`: Seconds until the client's window ends
//! - `X-RateLimit-Limit`: Configured attempts per window
//! - `X-RateLimit-Remaining`: Always `0`

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::{TrustedProxies, client_key};
use crate::admission::{Admission, AdmissionController};
use crate::error::AppError;
use crate::metrics;

/// Admission layer for Tower middleware stacks.
///
/// # Example
///
/// ```rust,ignore
/// let controller = AdmissionController::new(5, Duration::from_secs(900))?;
/// let app = Router::new()
///     .route("/api/login", post(login))
///     .route_layer(AdmissionLayer::new(controller, TrustedProxies::default()));
/// ```
#[derive(Clone)]
pub struct AdmissionLayer {
    controller: AdmissionController,
    trusted_proxies: Arc<TrustedProxies>,
}

impl AdmissionLayer {
    pub fn new(controller: AdmissionController, trusted_proxies: TrustedProxies) -> Self {
        Self {
            controller,
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            controller: self.controller.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

/// Admission service wrapper.
#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    controller: AdmissionController,
    trusted_proxies: Arc<TrustedProxies>,
}

impl<S> Service<Request<Body>> for AdmissionService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let Some(key) = client_key(&req, &self.trusted_proxies) else {
            warn!(path = %req.uri().path(), "No client address; rejecting request");
            metrics::record_admission_rejection();
            let response =
                AppError::BadRequest("Unable to identify client".to_string()).into_response();
            return Box::pin(async move { Ok(response) });
        };

        // The ready clone stays with the caller's future; leave a fresh one behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let outcome = self.controller.check(&key);
        let limit = self.controller.limit();

        Box::pin(async move {
            match outcome {
                Admission::Admitted { remaining } => {
                    debug!(client_ip = %key, remaining, "Admitted");
                    inner.call(req).await
                }
                Admission::Rejected { .. } => {
                    let retry_after_secs = outcome.retry_after_secs().unwrap_or(1);
                    warn!(
                        client_ip = %key,
                        path = %req.uri().path(),
                        retry_after_secs,
                        "Admission limit exceeded"
                    );
                    metrics::record_admission_rejection();

                    Ok(AppError::TooManyRequests {
                        retry_after_secs,
                        limit,
                    }
                    .into_response())
                }
            }
        })
    }
}
