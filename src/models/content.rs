use serde::{Deserialize, Serialize};

/// A supported site language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Short code, e.g. `en`
    pub code: String,
    /// Display name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// One translatable property with its text per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticContent {
    pub property: String,
    /// Ordered by language code
    pub contents: Vec<Translation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub lang_code: String,
    pub content: String,
}

/// Create a single translation of a property.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTranslationRequest {
    #[serde(default)]
    pub property: String,
    #[serde(default)]
    pub lang_code: String,
    #[serde(default)]
    pub content: String,
}

/// Replace the text of an existing translation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateTranslationRequest {
    #[serde(default)]
    pub lang_code: String,
    #[serde(default)]
    pub content: String,
}

/// Add a language. `active` defaults to false.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateLanguageRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flag_url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Replace every attribute of a language except its code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateLanguageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flag_url: Option<String>,
    #[serde(default)]
    pub active: bool,
}
