//! HTTP middleware guarding the API.
//!
//! - **Admission**: per-client fixed-window throttling of sensitive routes
//! - **Bearer Authentication**: session token verification for protected routes
//! - **Client Keys**: trusted-proxy aware client address extraction
//! - **Header Policies**: `no-store` for responses carrying tokens or admin data
//!
//! Conditional (ETag) responses are produced by handlers through
//! [`crate::fingerprint::ConditionalRequest`] because the fingerprint needs the
//! finished payload.
//!
//! # Pipeline
//!
//! ```text
//! Request → Admission (login) → Bearer Auth (/api/admin) → Handler → Conditional → Response
//!              ↓                      ↓                                   ↓
//!          429 Retry-After       401 Unauthorized                  304 Not Modified
//! ```

pub mod admission;
pub mod auth;
pub mod headers;
pub mod ip;

pub use admission::AdmissionLayer;
pub use auth::{AuthFailure, AuthUser, BearerAuthLayer, authenticate};
pub use headers::no_store;
pub use ip::{TrustedProxies, client_key};
