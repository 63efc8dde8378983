//! Language handling for translated content.
//!
//! # Architecture
//!
//! - `catalog`: Single source of truth for supported languages and their provider codes
//! - `resolver`: Turns per-user language settings into an ordered target list
//! - `metrics`: Translation observability counters
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_sync::i18n::{LanguageCatalog, LanguageConfig, LanguageSetResolver};
//!
//! let german = LanguageCatalog::get().lookup("de")?;
//!
//! let resolver = LanguageSetResolver::new("en");
//! let languages = resolver.resolve(&LanguageConfig::with_defaults("tr"));
//! ```

mod catalog;
mod metrics;
mod resolver;

pub use catalog::{LanguageCatalog, LanguageInfo};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use resolver::{LanguageConfig, LanguageSetResolver};
