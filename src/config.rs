use crate::i18n::LanguageCatalog;
use crate::registry::TranslatableRegistry;
use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,

    // Translation provider
    pub translation_api_url: String,
    pub provider_timeout_secs: u64,
    pub provider_max_attempts: u32,

    // Languages
    pub default_language: String,

    // Content types and their translatable fields, in declaration order
    pub translatable_types: Vec<(String, Vec<String>)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_language = std::env::var("DEFAULT_LANGUAGE")
            .unwrap_or_else(|_| "en".to_string())
            .trim()
            .to_ascii_lowercase();
        if !LanguageCatalog::get().is_supported(&default_language) {
            bail!("DEFAULT_LANGUAGE '{}' is not a supported language", default_language);
        }

        let translatable_types = match std::env::var("TRANSLATABLE_TYPES") {
            Ok(raw) => parse_translatable_types(&raw).context("Invalid TRANSLATABLE_TYPES")?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://translation_sync.db".to_string()),

            translation_api_url: std::env::var("TRANSLATION_API_URL")
                .unwrap_or_else(|_| "https://api-free.deepl.com/v2/translate".to_string()),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            provider_max_attempts: std::env::var("PROVIDER_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),

            default_language,
            translatable_types,
        })
    }

    /// Build the translatable registry from `translatable_types`.
    pub fn build_registry(&self) -> TranslatableRegistry {
        self.translatable_types
            .iter()
            .fold(TranslatableRegistry::builder(), |builder, (content_type, fields)| {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                builder.register(content_type, &fields)
            })
            .build()
    }
}

/// Parse `article:title,body;page:title,content` into type/field lists.
pub fn parse_translatable_types(raw: &str) -> Result<Vec<(String, Vec<String>)>> {
    let mut types = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (content_type, fields) = entry
            .split_once(':')
            .with_context(|| format!("Expected 'type:field,...', got '{}'", entry))?;

        let content_type = content_type.trim();
        if content_type.is_empty() {
            bail!("Empty content type in '{}'", entry);
        }

        let fields: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        if fields.is_empty() {
            bail!("Content type '{}' has no fields", content_type);
        }

        types.push((content_type.to_string(), fields));
    }

    Ok(types)
}
