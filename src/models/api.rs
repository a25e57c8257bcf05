use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::{Identity, SessionClaims};

/// Login credentials.
///
/// Missing fields deserialize as empty strings so they are reported as
/// field validation errors rather than a generic body error.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request to replace the caller's password.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<Identity> for UserView {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.user_id,
            name: identity.name,
            email: identity.email,
        }
    }
}

/// Response carrying a freshly issued session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: bool,
    pub token: String,
    /// Omitted on refresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    pub needs_password_update: bool,
}

/// Caller profile with the stored action-required flag.
#[derive(Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub needs_password_update: bool,
}

impl Profile {
    /// Identity from `claims`, flag from the user directory.
    pub fn from_claims(claims: &SessionClaims, needs_password_update: bool) -> Self {
        Self {
            id: claims.user_id,
            name: claims.name.clone(),
            email: claims.email.clone(),
            needs_password_update,
        }
    }
}

/// Envelope for successful payloads: `{"status": true, "data": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub status: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { status: true, data }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Clients currently tracked by login admission control
    pub tracked_clients: usize,
}
