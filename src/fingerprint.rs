//! Content fingerprints and conditional (`If-None-Match`) responses.
//!
//! Read-mostly endpoints return a buffered payload; the guard serializes it
//! canonically, hashes the exact bytes it is about to send and compares the
//! hash with the entity tags the client already holds.
//!
//! # Canonical Form
//!
//! Payloads are serialized through [`serde_json::Value`] with every object's
//! keys sorted, then hashed with SHA-256. Two payloads with the same logical
//! content produce byte-identical bodies and therefore identical
//! fingerprints, regardless of map iteration order, the instance serving the
//! request or when it was computed. Sequences keep their order, so callers
//! must return rows in a deterministic order.
//!
//! # Responses
//!
//! - Match: `304 Not Modified`, no body, `ETag` echoed, `Cache-Control: no-cache`
//! - Miss: `200 OK` with the body, fresh `ETag`, `Cache-Control: no-cache`
//!   and `Vary: Accept-Language, Accept-Encoding`
//!
//! `no-cache` lets browsers keep the body but forces revalidation on every
//! use, so content edits become visible immediately.

use std::convert::Infallible;
use std::fmt;

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::metrics;

/// Cache directive sent with every fingerprinted response.
pub const CACHE_CONTROL_REVALIDATE: &str = "no-cache";

/// Request headers the fingerprinted representation may vary on.
pub const VARY_HEADERS: &str = "Accept-Language, Accept-Encoding";

/// Deterministic SHA-256 hash of a response body, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Fingerprint the canonical JSON serialization of `value`.
    pub fn of_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        canonical_json(value).map(|bytes| Self::of_bytes(&bytes))
    }

    /// Hex digest without quotes.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Strong entity tag form, e.g. `"9f86d0..."`.
    pub fn entity_tag(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// Serialize `value` to JSON with object keys sorted at every depth.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = sort_keys(serde_json::to_value(value)?);
    serde_json::to_vec(&value)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Parsed `If-None-Match` request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    /// `*`: matches any current representation
    Any,
    /// Opaque tags with quotes and any `W/` prefix removed
    Tags(Vec<String>),
}

impl IfNoneMatch {
    /// Parse one header value. Returns `None` when no usable tag is present.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(IfNoneMatch::Any);
        }

        let tags: Vec<String> = raw
            .split(',')
            .filter_map(|candidate| {
                let candidate = candidate.trim();
                let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
                let opaque = candidate.strip_prefix('"')?.strip_suffix('"')?;
                Some(opaque.to_string())
            })
            .collect();

        if tags.is_empty() {
            None
        } else {
            Some(IfNoneMatch::Tags(tags))
        }
    }

    /// Collect every `If-None-Match` header on a request.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let mut tags = Vec::new();
        for value in headers.get_all(header::IF_NONE_MATCH) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            match Self::parse(raw) {
                Some(IfNoneMatch::Any) => return Some(IfNoneMatch::Any),
                Some(IfNoneMatch::Tags(found)) => tags.extend(found),
                None => {}
            }
        }

        if tags.is_empty() {
            None
        } else {
            Some(IfNoneMatch::Tags(tags))
        }
    }

    /// Weak comparison against the current fingerprint.
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        match self {
            IfNoneMatch::Any => true,
            IfNoneMatch::Tags(tags) => tags.iter().any(|tag| tag == fingerprint.as_hex()),
        }
    }
}

/// Whether a conditional request could be answered without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }
}

/// Conditional-request state extracted from the incoming headers.
///
/// Handlers for cacheable routes take this extractor and finish with
/// [`ConditionalRequest::respond`] once their payload is complete. Errors
/// raised while building the payload short-circuit before any fingerprint
/// is computed.
#[derive(Debug, Clone, Default)]
pub struct ConditionalRequest {
    if_none_match: Option<IfNoneMatch>,
}

impl ConditionalRequest {
    pub fn new(if_none_match: Option<IfNoneMatch>) -> Self {
        Self { if_none_match }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(IfNoneMatch::from_headers(headers))
    }

    /// Compare the client's tags with `fingerprint`.
    pub fn evaluate(&self, fingerprint: &Fingerprint) -> CacheOutcome {
        match &self.if_none_match {
            Some(tags) if tags.matches(fingerprint) => CacheOutcome::Hit,
            _ => CacheOutcome::Miss,
        }
    }

    /// Serialize `payload`, fingerprint it and build the response.
    pub fn respond<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Response, serde_json::Error> {
        let body = canonical_json(payload)?;
        let fingerprint = Fingerprint::of_bytes(&body);
        Ok(self.respond_with(body, &fingerprint))
    }

    /// Build the response for an already serialized JSON `body`.
    pub fn respond_with(&self, body: Vec<u8>, fingerprint: &Fingerprint) -> Response {
        let outcome = self.evaluate(fingerprint);
        metrics::record_conditional_response(outcome.as_str());

        match outcome {
            CacheOutcome::Hit => not_modified(fingerprint),
            CacheOutcome::Miss => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (header::ETAG, fingerprint.entity_tag()),
                    (header::CACHE_CONTROL, CACHE_CONTROL_REVALIDATE.to_string()),
                    (header::VARY, VARY_HEADERS.to_string()),
                ],
                Body::from(body),
            )
                .into_response(),
        }
    }
}

fn not_modified(fingerprint: &Fingerprint) -> Response {
    (
        StatusCode::NOT_MODIFIED,
        [
            (header::ETAG, fingerprint.entity_tag()),
            (header::CACHE_CONTROL, CACHE_CONTROL_REVALIDATE.to_string()),
        ],
    )
        .into_response()
}

impl<S> FromRequestParts<S> for ConditionalRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
