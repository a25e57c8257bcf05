//! In-memory site languages and static translations.
//!
//! Reads return rows in a deterministic order (languages by code, properties
//! by name, translations by language code) so that serialized payloads, and
//! therefore their fingerprints, depend only on content.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::StoreError;
use crate::models::{Language, StaticContent, Translation};

/// property -> language code -> text
type TranslationTable = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Default)]
struct ContentTable {
    languages: BTreeMap<String, Language>,
    translations: TranslationTable,
}

/// Shared handle to the content tables. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    table: Arc<RwLock<ContentTable>>,
}

fn to_static_content(property: &str, by_lang: &BTreeMap<String, String>) -> StaticContent {
    StaticContent {
        property: property.to_string(),
        contents: by_lang
            .iter()
            .map(|(lang_code, content)| Translation {
                lang_code: lang_code.clone(),
                content: content.clone(),
            })
            .collect(),
    }
}

impl ContentStore {
    /// Store seeded with English and Dutch and a few site strings.
    pub fn with_defaults() -> Self {
        let mut table = ContentTable::default();

        for (code, name) in [("en", "English"), ("nl", "Nederlands")] {
            table.languages.insert(
                code.to_string(),
                Language {
                    code: code.to_string(),
                    name: name.to_string(),
                    flag_url: None,
                    active: true,
                },
            );
        }

        let seed = [
            ("footer.contact", "en", "Contact us"),
            ("footer.contact", "nl", "Contacteer ons"),
            ("home.title", "en", "Geocaching events"),
            ("home.title", "nl", "Geocaching evenementen"),
        ];
        for (property, lang, text) in seed {
            table
                .translations
                .entry(property.to_string())
                .or_default()
                .insert(lang.to_string(), text.to_string());
        }

        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Add a language whose code is not taken yet.
    pub async fn create_language(&self, language: Language) -> Result<Language, StoreError> {
        let mut table = self.table.write().await;
        if table.languages.contains_key(&language.code) {
            return Err(StoreError::Duplicate(format!("language '{}'", language.code)));
        }
        table
            .languages
            .insert(language.code.clone(), language.clone());
        Ok(language)
    }

    /// Replace an existing language, keyed by its code.
    pub async fn update_language(&self, language: Language) -> Result<Language, StoreError> {
        let mut table = self.table.write().await;
        let slot = table
            .languages
            .get_mut(&language.code)
            .ok_or_else(|| StoreError::NotFound(format!("language '{}'", language.code)))?;
        *slot = language.clone();
        Ok(language)
    }

    /// Remove a language together with every translation written in it.
    ///
    /// Properties left without any translation are removed as well.
    pub async fn delete_language(&self, code: &str) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        if table.languages.remove(code).is_none() {
            return Err(StoreError::NotFound(format!("language '{code}'")));
        }
        table.translations.retain(|_, by_lang| {
            by_lang.remove(code);
            !by_lang.is_empty()
        });
        Ok(())
    }

    /// Languages ordered by code; inactive ones only when `include_inactive`.
    pub async fn languages(&self, include_inactive: bool) -> Vec<Language> {
        self.table
            .read()
            .await
            .languages
            .values()
            .filter(|lang| include_inactive || lang.active)
            .cloned()
            .collect()
    }

    /// Every property with its translations, ordered by property.
    pub async fn static_contents(&self) -> Vec<StaticContent> {
        self.table
            .read()
            .await
            .translations
            .iter()
            .map(|(property, by_lang)| to_static_content(property, by_lang))
            .collect()
    }

    pub async fn static_content(&self, property: &str) -> Option<StaticContent> {
        self.table
            .read()
            .await
            .translations
            .get(property)
            .map(|by_lang| to_static_content(property, by_lang))
    }

    /// Add a translation that must not exist yet.
    pub async fn create_translation(
        &self,
        property: &str,
        lang_code: &str,
        content: &str,
    ) -> Result<StaticContent, StoreError> {
        let mut table = self.table.write().await;
        if !table.languages.contains_key(lang_code) {
            return Err(StoreError::UnknownLanguage(lang_code.to_string()));
        }

        let by_lang = table.translations.entry(property.to_string()).or_default();
        if by_lang.contains_key(lang_code) {
            return Err(StoreError::Duplicate(format!(
                "translation '{property}' for language '{lang_code}'"
            )));
        }
        by_lang.insert(lang_code.to_string(), content.to_string());

        Ok(to_static_content(property, by_lang))
    }

    /// Replace the text of an existing translation.
    pub async fn update_translation(
        &self,
        property: &str,
        lang_code: &str,
        content: &str,
    ) -> Result<StaticContent, StoreError> {
        let mut table = self.table.write().await;
        let by_lang = table
            .translations
            .get_mut(property)
            .ok_or_else(|| StoreError::NotFound(format!("property '{property}'")))?;
        let text = by_lang.get_mut(lang_code).ok_or_else(|| {
            StoreError::NotFound(format!(
                "translation '{property}' for language '{lang_code}'"
            ))
        })?;

        *text = content.to_string();
        Ok(to_static_content(property, by_lang))
    }

    /// Remove a property and all of its translations.
    pub async fn delete_property(&self, property: &str) -> Result<(), StoreError> {
        self.table
            .write()
            .await
            .translations
            .remove(property)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("property '{property}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_ordered() {
        let store = ContentStore::with_defaults();

        let codes: Vec<String> = store
            .languages(false)
            .await
            .into_iter()
            .map(|lang| lang.code)
            .collect();
        assert_eq!(codes, vec!["en", "nl"]);

        let properties: Vec<String> = store
            .static_contents()
            .await
            .into_iter()
            .map(|content| content.property)
            .collect();
        assert_eq!(properties, vec!["footer.contact", "home.title"]);
    }

    #[tokio::test]
    async fn test_inactive_languages_hidden_from_public_listing() {
        let store = ContentStore::with_defaults();
        store
            .create_language(Language {
                code: "fr".to_string(),
                name: "Français".to_string(),
                flag_url: Some("/flags/fr.svg".to_string()),
                active: false,
            })
            .await
            .unwrap();

        assert_eq!(store.languages(false).await.len(), 2);
        assert_eq!(store.languages(true).await.len(), 3);
    }

    #[tokio::test]
    async fn test_create_translation_rules() {
        let store = ContentStore::with_defaults();

        let created = store
            .create_translation("about.intro", "en", "About us")
            .await
            .unwrap();
        assert_eq!(created.contents.len(), 1);

        assert!(matches!(
            store.create_translation("about.intro", "en", "Again").await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.create_translation("about.intro", "de", "Über uns").await,
            Err(StoreError::UnknownLanguage(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = ContentStore::with_defaults();

        let updated = store
            .update_translation("home.title", "en", "Events")
            .await
            .unwrap();
        assert_eq!(updated.contents[0].content, "Events");

        assert!(matches!(
            store.update_translation("home.title", "fr", "x").await,
            Err(StoreError::NotFound(_))
        ));

        store.delete_property("home.title").await.unwrap();
        assert!(store.static_content("home.title").await.is_none());
        assert!(matches!(
            store.delete_property("home.title").await,
            Err(StoreError::NotFound(_))
        ));
    }

    fn language(code: &str, name: &str, active: bool) -> Language {
        Language {
            code: code.to_string(),
            name: name.to_string(),
            flag_url: None,
            active,
        }
    }

    #[tokio::test]
    async fn test_language_lifecycle() {
        let store = ContentStore::with_defaults();

        store.create_language(language("de", "Deutsch", true)).await.unwrap();
        assert!(matches!(
            store.create_language(language("de", "German", true)).await,
            Err(StoreError::Duplicate(_))
        ));

        let updated = store
            .update_language(language("de", "Deutsch (DE)", false))
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(store.languages(false).await.len(), 2);
        assert!(matches!(
            store.update_language(language("fr", "Français", true)).await,
            Err(StoreError::NotFound(_))
        ));

        store.delete_language("de").await.unwrap();
        assert_eq!(store.languages(true).await.len(), 2);
        assert!(matches!(
            store.delete_language("de").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_language_drops_its_translations() {
        let store = ContentStore::with_defaults();
        store
            .create_translation("about.intro", "nl", "Over ons")
            .await
            .unwrap();

        store.delete_language("nl").await.unwrap();

        let title = store.static_content("home.title").await.unwrap();
        assert_eq!(title.contents.len(), 1);
        assert_eq!(title.contents[0].lang_code, "en");
        assert!(store.static_content("about.intro").await.is_none());
    }
}
