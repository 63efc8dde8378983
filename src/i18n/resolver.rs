//! Turns a user's language settings into the ordered list of languages
//! content should exist in.
//!
//! Settings may be edited by hand, so nothing here fails: malformed codes are
//! dropped and logged at debug level.

use crate::i18n::LanguageCatalog;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-user language settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language content is authored in
    pub primary_language: String,

    /// Additional languages the author opted into (order is not meaningful)
    #[serde(default)]
    pub enabled_languages: Vec<String>,

    /// Dashboard UI language, unrelated to content
    #[serde(default)]
    pub dashboard_language: Option<String>,
}

impl LanguageConfig {
    /// Settings created on first access: only the primary language.
    pub fn with_defaults(primary_language: &str) -> Self {
        Self {
            primary_language: primary_language.to_string(),
            enabled_languages: Vec::new(),
            dashboard_language: None,
        }
    }
}

/// Resolves [`LanguageConfig`] into an ordered, deduplicated language list.
#[derive(Debug, Clone)]
pub struct LanguageSetResolver {
    default_language: String,
}

impl LanguageSetResolver {
    /// Create a resolver that falls back to `default_language` when the
    /// configured primary language is malformed.
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: normalize(&default_language.into()).unwrap_or_else(|| "en".to_string()),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Resolve the effective language list.
    ///
    /// The primary language always comes first, followed by each well-formed
    /// enabled code exactly once in encounter order. Codes are trimmed and
    /// ASCII-lowercased before comparison.
    pub fn resolve(&self, config: &LanguageConfig) -> Vec<String> {
        let primary = match normalize(&config.primary_language) {
            Some(code) => code,
            None => {
                debug!(
                    "Malformed primary language '{}', using default '{}'",
                    config.primary_language, self.default_language
                );
                self.default_language.clone()
            }
        };

        let mut languages = vec![primary];
        for raw in &config.enabled_languages {
            match normalize(raw) {
                Some(code) if !languages.contains(&code) => languages.push(code),
                Some(_) => {}
                None => debug!("Dropping malformed language code '{}'", raw),
            }
        }
        languages
    }

    /// Like [`resolve`](Self::resolve), but also drops codes the catalog does
    /// not know. The primary language is kept regardless, since content in it
    /// already exists.
    pub fn resolve_supported(&self, config: &LanguageConfig) -> Vec<String> {
        let catalog = LanguageCatalog::get();
        let mut languages = self.resolve(config);
        let primary = languages.remove(0);

        let mut supported = vec![primary];
        for code in languages {
            if catalog.is_supported(&code) {
                supported.push(code);
            } else {
                debug!("Dropping unsupported language '{}'", code);
            }
        }
        supported
    }

    /// Translation targets: supported languages other than the primary.
    pub fn targets(&self, config: &LanguageConfig) -> Vec<String> {
        self.resolve_supported(config).into_iter().skip(1).collect()
    }
}

/// Trim and lowercase a code; `None` unless it is 2-3 ASCII letters.
fn normalize(raw: &str) -> Option<String> {
    let code = raw.trim();
    let well_formed = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic());
    well_formed.then(|| code.to_ascii_lowercase())
}
