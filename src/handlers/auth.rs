//! Session endpoints.
//!
//! # Endpoints
//!
//! - `POST /api/login` - Exchange credentials for a session token (admission-checked)
//! - `GET /api/admin/profile` - Caller identity with the stored action-required flag
//! - `POST /api/admin/refresh` - Reissue a token for the current session
//! - `POST /api/admin/logout` - Stateless acknowledgement
//! - `POST /api/admin/change-password` - Replace the caller's password
//!
//! Tokens are never revoked server-side; logout only tells the client to
//! drop its copy.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::{info, instrument, warn};

use super::json_body;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middleware::AuthUser;
use crate::models::{
    AuthResponse, ChangePasswordRequest, DataResponse, LoginRequest, MessageResponse, Profile,
    UserView,
};
use crate::state::AppState;
use crate::validation::{validate_change_password, validate_login};

/// Verify credentials and issue a session token.
///
/// An unknown email and a wrong password produce the same response.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let request = json_body(payload)?;
    validate_login(&request)?;

    let Some(user) = state.users.find_by_email(&request.email).await else {
        warn!("Login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !state.vault.verify(&request.password, &user.password_hash).await? {
        warn!(user_id = user.id, "Login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let identity = user.identity();
    let token = state
        .tokens
        .issue(&identity, user.needs_password_update)
        .map_err(AppError::TokenIssue)?;
    metrics::record_token_issued("login");
    info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse {
        status: true,
        token,
        user: Some(UserView::from(identity)),
        needs_password_update: user.needs_password_update,
    }))
}

/// Look up the stored flag; a session whose user no longer exists is
/// treated as unauthenticated.
async fn stored_flag(state: &AppState, user_id: i64) -> AppResult<bool> {
    state
        .users
        .needs_password_update(user_id)
        .await
        .ok_or(AppError::Unauthorized)
}

#[instrument(skip_all, fields(user_id = claims.user_id))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<DataResponse<Profile>>> {
    let needs_password_update = stored_flag(&state, claims.user_id).await?;
    Ok(Json(DataResponse::new(Profile::from_claims(
        &claims,
        needs_password_update,
    ))))
}

/// Reissue a token. The flag comes from the user directory, not from the
/// presented token.
#[instrument(skip_all, fields(user_id = claims.user_id))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<AuthResponse>> {
    let needs_password_update = stored_flag(&state, claims.user_id).await?;
    let token = state
        .tokens
        .issue(&claims.identity(), needs_password_update)
        .map_err(AppError::TokenIssue)?;
    metrics::record_token_issued("refresh");

    Ok(Json(AuthResponse {
        status: true,
        token,
        user: None,
        needs_password_update,
    }))
}

#[instrument(skip_all, fields(user_id = claims.user_id))]
pub async fn logout(AuthUser(claims): AuthUser) -> Json<MessageResponse> {
    info!("User logged out");
    Json(MessageResponse::ok("Logged out successfully"))
}

#[instrument(skip_all, fields(user_id = claims.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let request = json_body(payload)?;
    validate_change_password(&request)?;

    let user = state
        .users
        .find_by_id(claims.user_id)
        .await
        .ok_or(AppError::Unauthorized)?;

    if !state
        .vault
        .verify(&request.current_password, &user.password_hash)
        .await?
    {
        warn!("Password change rejected: current password mismatch");
        return Err(AppError::IncorrectPassword);
    }

    let password_hash = state.vault.hash(&request.new_password).await?;
    let user = state.users.update_password(user.id, password_hash).await?;

    let identity = user.identity();
    let token = state
        .tokens
        .issue(&identity, false)
        .map_err(AppError::TokenIssue)?;
    metrics::record_token_issued("password_change");
    info!("Password changed");

    Ok(Json(AuthResponse {
        status: true,
        token,
        user: Some(UserView::from(identity)),
        needs_password_update: false,
    }))
}
