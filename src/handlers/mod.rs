mod auth;
mod content;
mod health;

pub use auth::{change_password, login, logout, profile, refresh};
pub use content::{
    admin_languages, admin_static_content, admin_static_property, create_language,
    create_translation, delete_language, delete_property, languages, static_content,
    update_language, update_translation,
};
pub use health::health_check;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::{AppError, AppResult};

/// Unwrap a JSON body, turning extractor rejections into `BadRequest` with a
/// message that does not echo serde internals.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected request body");
            let message = match rejection {
                JsonRejection::MissingJsonContentType(_) => {
                    "Expected request with `Content-Type: application/json`"
                }
                JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body",
                JsonRejection::JsonDataError(_) => "Invalid data in request body",
                _ => "Invalid request body",
            };
            Err(AppError::BadRequest(message.to_string()))
        }
    }
}
