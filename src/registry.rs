//! Registry of translatable content types.
//!
//! Built once at startup and read-only afterwards. Registration resolves every
//! (field, language) pair to its storage column up front, so nothing later has
//! to format column names on the fly.

use crate::i18n::LanguageCatalog;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// A translatable field with its per-language column accessor map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableField {
    name: String,
    columns: BTreeMap<&'static str, String>,
}

impl TranslatableField {
    fn new(name: &str) -> Self {
        let columns = LanguageCatalog::get()
            .list_all()
            .into_iter()
            .map(|lang| (lang.code, format!("{}_{}", name, lang.code)))
            .collect();
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Base column name, holding primary-language content.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column holding this field's content in `language`, if the language is
    /// in the catalog.
    pub fn column_for(&self, language: &str) -> Option<&str> {
        self.columns.get(language).map(String::as_str)
    }

    /// Human-readable label derived from the field name ("meta_title" -> "Meta title").
    pub fn label(&self) -> String {
        let spaced = self.name.replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Immutable mapping of content type to translatable fields.
#[derive(Debug, Clone, Default)]
pub struct TranslatableRegistry {
    types: HashMap<String, Vec<TranslatableField>>,
}

impl TranslatableRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Fields registered for `content_type`, in registration order.
    pub fn fields(&self, content_type: &str) -> &[TranslatableField] {
        self.types
            .get(content_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn field(&self, content_type: &str, name: &str) -> Option<&TranslatableField> {
        self.fields(content_type).iter().find(|f| f.name == name)
    }

    pub fn is_registered(&self, content_type: &str) -> bool {
        self.types.contains_key(content_type)
    }

    /// Registered content type names, sorted.
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.types.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Startup-time builder for [`TranslatableRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: HashMap<String, Vec<TranslatableField>>,
}

impl RegistryBuilder {
    /// Register `content_type` with the given translatable field names.
    ///
    /// Duplicate names are collapsed. Registering the same type twice replaces
    /// the earlier field list.
    pub fn register(mut self, content_type: &str, field_names: &[&str]) -> Self {
        let mut fields: Vec<TranslatableField> = Vec::with_capacity(field_names.len());
        for name in field_names {
            let name = name.trim();
            if name.is_empty() || fields.iter().any(|f| f.name == name) {
                continue;
            }
            fields.push(TranslatableField::new(name));
        }

        if self.types.insert(content_type.to_string(), fields).is_some() {
            warn!(
                "Content type '{}' registered twice, replacing its fields",
                content_type
            );
        }
        self
    }

    pub fn build(self) -> TranslatableRegistry {
        TranslatableRegistry { types: self.types }
    }
}
