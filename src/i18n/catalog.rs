//! Language catalog: single source of truth for all languages content can be
//! translated into.
//!
//! The catalog maps the internal language code used in column names and user
//! settings to the code the machine-translation provider expects, plus the
//! names shown to authors. It is a lazily initialised `OnceLock` singleton and
//! is immutable for the lifetime of the process.

use crate::error::{Result, TranslateError};
use std::sync::OnceLock;

/// Metadata for a supported language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    /// Internal ISO 639-1 code (e.g., "en", "de")
    pub code: &'static str,

    /// Code sent to the translation provider (e.g., "EN", "PT-PT")
    pub provider_code: &'static str,

    /// English name of the language (e.g., "German")
    pub name: &'static str,

    /// Native name of the language (e.g., "Deutsch")
    pub native_name: &'static str,
}

/// Global language catalog.
pub struct LanguageCatalog {
    languages: Vec<LanguageInfo>,
}

static CATALOG: OnceLock<LanguageCatalog> = OnceLock::new();

impl LanguageCatalog {
    /// Get the global language catalog instance.
    pub fn get() -> &'static LanguageCatalog {
        CATALOG.get_or_init(|| LanguageCatalog {
            languages: default_languages(),
        })
    }

    /// Look up a language by its internal code.
    ///
    /// # Returns
    /// * `Ok(&LanguageInfo)` if the language is in the catalog
    /// * `Err(TranslateError::UnsupportedLanguage)` otherwise
    pub fn lookup(&self, code: &str) -> Result<&LanguageInfo> {
        self.get_by_code(code)
            .ok_or_else(|| TranslateError::UnsupportedLanguage(code.to_string()))
    }

    /// Get a language by its internal code, if present.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageInfo> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Check if a language code is in the catalog.
    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    /// All catalog languages, in catalog order.
    pub fn list_all(&self) -> Vec<&LanguageInfo> {
        self.languages.iter().collect()
    }

    /// Human-readable (English) name for a code, or the code itself when unknown.
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.get_by_code(code).map(|lang| lang.name).unwrap_or(code)
    }
}

fn lang(
    code: &'static str,
    provider_code: &'static str,
    name: &'static str,
    native_name: &'static str,
) -> LanguageInfo {
    LanguageInfo {
        code,
        provider_code,
        name,
        native_name,
    }
}

/// Languages the provider accepts as both source and target.
fn default_languages() -> Vec<LanguageInfo> {
    vec![
        lang("ar", "AR", "Arabic", "العربية"),
        lang("bg", "BG", "Bulgarian", "Български"),
        lang("cs", "CS", "Czech", "Čeština"),
        lang("da", "DA", "Danish", "Dansk"),
        lang("de", "DE", "German", "Deutsch"),
        lang("el", "EL", "Greek", "Ελληνικά"),
        lang("en", "EN", "English", "English"),
        lang("es", "ES", "Spanish", "Español"),
        lang("et", "ET", "Estonian", "Eesti"),
        lang("fi", "FI", "Finnish", "Suomi"),
        lang("fr", "FR", "French", "Français"),
        lang("hu", "HU", "Hungarian", "Magyar"),
        lang("id", "ID", "Indonesian", "Bahasa Indonesia"),
        lang("it", "IT", "Italian", "Italiano"),
        lang("ja", "JA", "Japanese", "日本語"),
        lang("ko", "KO", "Korean", "한국어"),
        lang("lt", "LT", "Lithuanian", "Lietuvių"),
        lang("lv", "LV", "Latvian", "Latviešu"),
        lang("nb", "NB", "Norwegian", "Norsk bokmål"),
        lang("nl", "NL", "Dutch", "Nederlands"),
        lang("pl", "PL", "Polish", "Polski"),
        lang("pt", "PT-PT", "Portuguese", "Português"),
        lang("ro", "RO", "Romanian", "Română"),
        lang("ru", "RU", "Russian", "Русский"),
        lang("sk", "SK", "Slovak", "Slovenčina"),
        lang("sl", "SL", "Slovenian", "Slovenščina"),
        lang("sv", "SV", "Swedish", "Svenska"),
        lang("tr", "TR", "Turkish", "Türkçe"),
        lang("uk", "UK", "Ukrainian", "Українська"),
        lang("zh", "ZH", "Chinese", "中文"),
    ]
}
