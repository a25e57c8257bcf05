//! Languages and static translations.
//!
//! # Endpoints
//!
//! Public, cacheable (`ETag` / `If-None-Match`):
//! - `GET /api/languages` - Active languages
//! - `GET /api/static` - Every property with its translations
//!
//! Protected (`/api/admin`):
//! - `GET /languages` - All languages, including inactive ones
//! - `POST /languages` - Add a language
//! - `PUT /languages/{code}` - Replace a language
//! - `DELETE /languages/{code}` - Remove a language and its translations
//! - `GET /static` - Every property with its translations
//! - `POST /static` - Add a translation
//! - `GET /static/{property}` - One property
//! - `PUT /static/{property}` - Replace one translation
//! - `DELETE /static/{property}` - Remove a property and its translations

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use tracing::{info, instrument};

use super::json_body;
use crate::error::{AppError, AppResult};
use crate::fingerprint::ConditionalRequest;
use crate::models::{
    CreateLanguageRequest, CreateTranslationRequest, DataResponse, Language, MessageResponse,
    StaticContent, UpdateLanguageRequest, UpdateTranslationRequest,
};
use crate::state::AppState;
use crate::validation::{
    validate_content, validate_lang_code, validate_language_name, validate_property,
};

fn conditional<T: Serialize>(conditional: &ConditionalRequest, data: T) -> AppResult<Response> {
    conditional
        .respond(&DataResponse::new(data))
        .map_err(|e| AppError::Internal(format!("failed to serialize payload: {e}")))
}

#[instrument(skip_all)]
pub async fn languages(
    State(state): State<AppState>,
    cache: ConditionalRequest,
) -> AppResult<Response> {
    conditional(&cache, state.content.languages(false).await)
}

#[instrument(skip_all)]
pub async fn static_content(
    State(state): State<AppState>,
    cache: ConditionalRequest,
) -> AppResult<Response> {
    conditional(&cache, state.content.static_contents().await)
}

#[instrument(skip_all)]
pub async fn admin_languages(State(state): State<AppState>) -> Json<DataResponse<Vec<Language>>> {
    Json(DataResponse::new(state.content.languages(true).await))
}

#[instrument(skip_all)]
pub async fn create_language(
    State(state): State<AppState>,
    payload: Result<Json<CreateLanguageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<Language>>)> {
    let request = json_body(payload)?;
    validate_lang_code(&request.code)?;
    validate_language_name(&request.name)?;

    let language = state
        .content
        .create_language(Language {
            code: request.code,
            name: request.name,
            flag_url: request.flag_url,
            active: request.active,
        })
        .await?;
    info!(code = %language.code, active = language.active, "Language created");

    Ok((StatusCode::CREATED, Json(DataResponse::new(language))))
}

#[instrument(skip(state, payload))]
pub async fn update_language(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: Result<Json<UpdateLanguageRequest>, JsonRejection>,
) -> AppResult<Json<DataResponse<Language>>> {
    let request = json_body(payload)?;
    validate_lang_code(&code)?;
    validate_language_name(&request.name)?;

    let language = state
        .content
        .update_language(Language {
            code,
            name: request.name,
            flag_url: request.flag_url,
            active: request.active,
        })
        .await?;
    info!(active = language.active, "Language updated");

    Ok(Json(DataResponse::new(language)))
}

#[instrument(skip(state))]
pub async fn delete_language(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    validate_lang_code(&code)?;

    state.content.delete_language(&code).await?;
    info!("Language deleted");

    Ok(Json(MessageResponse::ok("Language deleted")))
}

#[instrument(skip_all)]
pub async fn admin_static_content(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<StaticContent>>> {
    Json(DataResponse::new(state.content.static_contents().await))
}

#[instrument(skip(state))]
pub async fn admin_static_property(
    State(state): State<AppState>,
    Path(property): Path<String>,
) -> AppResult<Json<DataResponse<StaticContent>>> {
    validate_property(&property)?;

    let content = state
        .content
        .static_content(&property)
        .await
        .ok_or_else(|| AppError::NotFound(format!("property '{property}' not found")))?;

    Ok(Json(DataResponse::new(content)))
}

#[instrument(skip_all)]
pub async fn create_translation(
    State(state): State<AppState>,
    payload: Result<Json<CreateTranslationRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<StaticContent>>)> {
    let request = json_body(payload)?;
    validate_property(&request.property)?;
    validate_lang_code(&request.lang_code)?;
    validate_content(&request.content)?;

    let content = state
        .content
        .create_translation(&request.property, &request.lang_code, &request.content)
        .await?;
    info!(property = %request.property, lang_code = %request.lang_code, "Translation created");

    Ok((StatusCode::CREATED, Json(DataResponse::new(content))))
}

#[instrument(skip(state, payload))]
pub async fn update_translation(
    State(state): State<AppState>,
    Path(property): Path<String>,
    payload: Result<Json<UpdateTranslationRequest>, JsonRejection>,
) -> AppResult<Json<DataResponse<StaticContent>>> {
    let request = json_body(payload)?;
    validate_property(&property)?;
    validate_lang_code(&request.lang_code)?;
    validate_content(&request.content)?;

    let content = state
        .content
        .update_translation(&property, &request.lang_code, &request.content)
        .await?;
    info!(lang_code = %request.lang_code, "Translation updated");

    Ok(Json(DataResponse::new(content)))
}

#[instrument(skip(state))]
pub async fn delete_property(
    State(state): State<AppState>,
    Path(property): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    validate_property(&property)?;

    state.content.delete_property(&property).await?;
    info!("Property deleted");

    Ok(Json(MessageResponse::ok("Static content deleted")))
}
