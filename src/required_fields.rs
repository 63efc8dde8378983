//! Which per-language inputs an authoring form must require, and validation of
//! submitted values against that set.
//!
//! Rules are dormant while an author works in a single language: only when
//! the effective language set grows beyond the primary does every non-primary
//! column of every registered field become required.

use crate::db::ContentEntity;
use crate::i18n::{LanguageCatalog, LanguageConfig, LanguageSetResolver};
use crate::registry::TranslatableRegistry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A missing per-language value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub language: String,
    /// Human-readable language name, e.g. "German"
    pub language_name: String,
    /// Form input / storage column, e.g. "title_de"
    pub column: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A required per-language input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequiredInput<'a> {
    field: &'a str,
    label: String,
    language: String,
    column: &'a str,
}

pub struct RequiredFieldRules {
    registry: Arc<TranslatableRegistry>,
    resolver: LanguageSetResolver,
}

impl RequiredFieldRules {
    pub fn new(registry: Arc<TranslatableRegistry>, resolver: LanguageSetResolver) -> Self {
        Self { registry, resolver }
    }

    fn required_inputs(&self, content_type: &str, config: &LanguageConfig) -> Vec<RequiredInput<'_>> {
        let targets = self.resolver.targets(config);
        let mut inputs = Vec::new();

        for language in &targets {
            for field in self.registry.fields(content_type) {
                if let Some(column) = field.column_for(language) {
                    inputs.push(RequiredInput {
                        field: field.name(),
                        label: field.label(),
                        language: language.clone(),
                        column,
                    });
                }
            }
        }
        inputs
    }

    /// Column names that must be filled, e.g. `{"title_en", "body_en"}`.
    ///
    /// Empty when only the primary language is in effect or the content type
    /// is not registered.
    pub fn required_fields(&self, content_type: &str, config: &LanguageConfig) -> BTreeSet<String> {
        self.required_inputs(content_type, config)
            .into_iter()
            .map(|input| input.column.to_string())
            .collect()
    }

    /// Check submitted form values. Blank and missing values are errors,
    /// reported in language-then-field order.
    pub fn validate(
        &self,
        content_type: &str,
        config: &LanguageConfig,
        submitted: &BTreeMap<String, String>,
    ) -> Result<(), Vec<FieldError>> {
        let catalog = LanguageCatalog::get();
        let errors: Vec<FieldError> = self
            .required_inputs(content_type, config)
            .into_iter()
            .filter(|input| {
                submitted
                    .get(input.column)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|input| {
                let language_name = catalog.display_name(&input.language).to_string();
                FieldError {
                    message: format!("{} ({}) is required.", input.label, language_name),
                    field: input.field.to_string(),
                    language: input.language,
                    language_name,
                    column: input.column.to_string(),
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Initial form values for the required inputs of an existing entity.
    ///
    /// Values absent from the entity seed as empty strings.
    pub fn initial_values(
        &self,
        content_type: &str,
        entity: &ContentEntity,
        config: &LanguageConfig,
    ) -> BTreeMap<String, String> {
        self.required_inputs(content_type, config)
            .into_iter()
            .map(|input| {
                let value = entity.get(input.column).unwrap_or_default().to_string();
                (input.column.to_string(), value)
            })
            .collect()
    }
}
