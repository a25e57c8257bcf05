use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{ChangePasswordRequest, LoginRequest};

// =============================================================================
// Validation Constants
// =============================================================================

/// Minimum length for a new password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Upper bound on password input, in bytes.
///
/// Argon2 accepts far longer inputs; the cap keeps a single request from
/// burning hashing time on megabytes of password.
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Maximum length for static content property keys.
pub const MAX_PROPERTY_LENGTH: usize = 128;

/// Maximum length for a language display name, in characters.
pub const MAX_LANGUAGE_NAME_LENGTH: usize = 64;

/// Maximum length for a translation text.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024;

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn into_result(errors: FieldErrors) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Both fields are required; every missing field is reported at once.
pub fn validate_login(request: &LoginRequest) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if request.email.trim().is_empty() {
        push(&mut errors, "email", "Email is required");
    }
    if request.password.is_empty() {
        push(&mut errors, "password", "Password is required");
    }
    if request.password.len() > MAX_PASSWORD_LENGTH {
        push(
            &mut errors,
            "password",
            format!("Password cannot exceed {MAX_PASSWORD_LENGTH} characters"),
        );
    }

    into_result(errors)
}

pub fn validate_change_password(request: &ChangePasswordRequest) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if request.current_password.is_empty() {
        push(&mut errors, "current_password", "Current password is required");
    }
    if let Err(message) = check_new_password(&request.new_password) {
        push(&mut errors, "new_password", message);
    }

    into_result(errors)
}

fn check_new_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        ));
    }
    Ok(())
}

/// Validate a static content property key such as `home.title`.
///
/// Rules:
/// - Must be between 1 and 128 characters
/// - Must start and end with an alphanumeric character
/// - Can contain alphanumeric characters, dots, underscores, and hyphens
/// - Cannot contain consecutive dots, underscores, or hyphens
pub fn validate_property(property: &str) -> AppResult<()> {
    if property.is_empty() {
        return Err(AppError::field("property", "Property is required"));
    }

    if property.len() > MAX_PROPERTY_LENGTH {
        return Err(AppError::field(
            "property",
            format!("Property cannot exceed {MAX_PROPERTY_LENGTH} characters"),
        ));
    }

    let chars: Vec<char> = property.chars().collect();

    if !chars.first().is_some_and(|c| c.is_ascii_alphanumeric())
        || !chars.last().is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::field(
            "property",
            "Property must start and end with an alphanumeric character",
        ));
    }

    let mut prev_special = false;
    for (i, &c) in chars.iter().enumerate() {
        let is_special = c == '.' || c == '_' || c == '-';

        if !c.is_ascii_alphanumeric() && !is_special {
            return Err(AppError::field(
                "property",
                format!("Property contains invalid character '{c}' at position {i}"),
            ));
        }

        if is_special && prev_special {
            return Err(AppError::field(
                "property",
                format!("Property cannot contain consecutive special characters at position {i}"),
            ));
        }

        prev_special = is_special;
    }

    Ok(())
}

/// Language codes are two or three lowercase ASCII letters, optionally with
/// a region suffix (`en`, `nl`, `pt-br`).
pub fn validate_lang_code(lang_code: &str) -> AppResult<()> {
    let mut parts = lang_code.splitn(2, '-');
    let primary = parts.next().unwrap_or_default();
    let region = parts.next();

    let primary_ok =
        (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.is_none_or(|r| {
        (2..=3).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if primary_ok && region_ok {
        Ok(())
    } else {
        Err(AppError::field(
            "lang_code",
            format!("Invalid language code '{lang_code}'"),
        ))
    }
}

pub fn validate_language_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::field("name", "Name is required"));
    }
    if name.chars().count() > MAX_LANGUAGE_NAME_LENGTH {
        return Err(AppError::field(
            "name",
            format!("Name cannot exceed {MAX_LANGUAGE_NAME_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Translation text must not be blank and must fit the size cap.
pub fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::field("content", "Content is required"));
    }
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(AppError::field(
            "content",
            format!("Content cannot exceed {MAX_CONTENT_LENGTH} bytes"),
        ));
    }
    Ok(())
}
