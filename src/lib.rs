//! Multi-tenant content translation synchronization.
//!
//! When an author saves content in their primary language, the host calls
//! [`AutoTranslator::on_content_saved`]. The orchestrator resolves the
//! author's target languages, translates every registered field through the
//! tenant's provider, gates the batch on the tenant's character quota and
//! writes only the per-language columns it touched.
//!
//! Authoring forms use [`RequiredFieldRules`] to know which per-language
//! inputs are mandatory for the same language set.

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod orchestrator;
pub mod provider;
pub mod quota;
pub mod registry;
pub mod required_fields;
pub mod retry;

pub use db::{ContentEntity, Database, Tenant};
pub use error::{ProviderError, TranslateError};
pub use i18n::{LanguageCatalog, LanguageConfig, LanguageSetResolver};
pub use orchestrator::{AutoTranslator, PairStatus, SkipReason, SyncStatus, TranslationOutcome};
pub use provider::{HttpProviderFactory, ProviderFactory, TranslationAdapter, TranslationProvider};
pub use quota::QuotaLedger;
pub use registry::TranslatableRegistry;
pub use required_fields::{FieldError, RequiredFieldRules};
