//! Response header policies.

use axum::http::{HeaderValue, header};
use axum::response::Response;

/// `Cache-Control` for responses that must never be stored.
pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, private";

/// Forbid every cache from storing `response`.
///
/// Used with `axum::middleware::map_response` on authentication and admin
/// routes, whose bodies carry tokens or per-user data.
pub async fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}
