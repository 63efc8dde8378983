//! Machine-translation provider boundary.
//!
//! [`TranslationAdapter`] is the only thing the orchestrator talks to. It
//! enforces the no-op rules, strips rich text to plain text and guarantees
//! that every failure comes back as a [`ProviderError`].

use crate::config::Config;
use crate::db::Tenant;
use crate::error::ProviderError;
use crate::i18n::{LanguageCatalog, TranslationMetrics};
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// An external machine-translation API.
///
/// Language arguments are provider codes (see `LanguageInfo::provider_code`),
/// and `text` is always plain text.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    async fn translate_plain(
        &self,
        text: &str,
        source_code: &str,
        target_code: &str,
    ) -> Result<String, ProviderError>;
}

/// Builds a provider bound to one tenant's credential.
pub trait ProviderFactory: Send + Sync {
    fn for_tenant(&self, tenant: &Tenant, credential: &str) -> Arc<dyn TranslationProvider>;
}

// ==================== HTTP provider ====================

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: Vec<&'a str>,
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: String,
}

/// DeepL-style JSON translation endpoint.
pub struct HttpTranslationProvider {
    client: reqwest::Client,
    api_url: String,
    credential: String,
    retry: RetryConfig,
}

impl HttpTranslationProvider {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        credential: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            credential: credential.into(),
            retry,
        }
    }

    async fn send_once(
        &self,
        text: &str,
        source_code: &str,
        target_code: &str,
    ) -> Result<String, ProviderError> {
        let request = TranslateRequest {
            text: vec![text],
            source_lang: source_code,
            target_lang: target_code,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.credential))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unreachable(format!("invalid response: {}", e)))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| {
                ProviderError::Unreachable("response contained no translations".to_string())
            })
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn translate_plain(
        &self,
        text: &str,
        source_code: &str,
        target_code: &str,
    ) -> Result<String, ProviderError> {
        with_retry_if(
            &self.retry,
            &format!("Translation {} -> {}", source_code, target_code),
            || self.send_once(text, source_code, target_code),
            ProviderError::is_retryable,
        )
        .await
    }
}

/// Map a non-success HTTP status to a typed provider error.
fn classify_status(status: u16, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    match status {
        401 | 403 => ProviderError::Unauthorized(detail),
        429 | 456 => ProviderError::RateLimited(detail),
        400 | 422 => ProviderError::InvalidLanguage(detail),
        _ => ProviderError::Unreachable(detail),
    }
}

/// Production factory: one shared HTTP client, one provider per tenant credential.
pub struct HttpProviderFactory {
    client: reqwest::Client,
    api_url: String,
    retry: RetryConfig,
}

impl HttpProviderFactory {
    pub fn new(api_url: &str, timeout: Duration, retry: RetryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("translation-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            retry,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            &config.translation_api_url,
            Duration::from_secs(config.provider_timeout_secs),
            RetryConfig::provider_call().with_max_attempts(config.provider_max_attempts),
        )
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn for_tenant(&self, tenant: &Tenant, credential: &str) -> Arc<dyn TranslationProvider> {
        debug!("Building provider for tenant {}", tenant.id);
        Arc::new(HttpTranslationProvider::new(
            self.client.clone(),
            self.api_url.clone(),
            credential,
            self.retry.clone(),
        ))
    }
}

// ==================== Adapter ====================

/// Boundary between the orchestrator and a provider.
#[derive(Clone)]
pub struct TranslationAdapter {
    provider: Arc<dyn TranslationProvider>,
    metrics: Arc<TranslationMetrics>,
}

impl TranslationAdapter {
    pub fn new(provider: Arc<dyn TranslationProvider>, metrics: Arc<TranslationMetrics>) -> Self {
        Self { provider, metrics }
    }

    /// Translate `text` from `source_lang` to `target_lang` (internal codes).
    ///
    /// Returns the input unchanged, without calling the provider, when the
    /// languages match or the text is blank. Rich text is sent as plain text;
    /// re-wrapping the result is the caller's concern.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError> {
        if source_lang == target_lang || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.translate_plain_text(&to_plain_text(text), source_lang, target_lang)
            .await
    }

    /// Translate text that is already plain, exactly as given.
    ///
    /// Callers that count or hash the text they send use this so the provider
    /// receives the same string they measured.
    pub async fn translate_plain_text(
        &self,
        plain: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError> {
        if source_lang == target_lang || plain.trim().is_empty() {
            return Ok(plain.to_string());
        }

        let catalog = LanguageCatalog::get();
        let source = catalog
            .get_by_code(source_lang)
            .ok_or_else(|| ProviderError::InvalidLanguage(format!("unsupported source '{}'", source_lang)))?;
        let target = catalog
            .get_by_code(target_lang)
            .ok_or_else(|| ProviderError::InvalidLanguage(format!("unsupported target '{}'", target_lang)))?;

        self.metrics.record_provider_call();
        match self
            .provider
            .translate_plain(plain, source.provider_code, target.provider_code)
            .await
        {
            Ok(translated) => Ok(translated),
            Err(e) => {
                self.metrics.record_provider_failure();
                warn!(
                    "{} translation {} -> {} failed: {}",
                    self.provider.name(),
                    source_lang,
                    target_lang,
                    e
                );
                Err(e)
            }
        }
    }
}

// ==================== Rich text ====================

/// Opening, closing or self-closing HTML tag with a known name. Attributes
/// must be `name=value` pairs, so comparisons like `x<y and z>w` never match.
const TAG_PATTERN: &str = concat!(
    r"(?i)</?(?:p|br|hr|b|i|u|s|em|strong|small|mark|sub|sup|span|div|a|img|",
    r"ul|ol|li|dl|dt|dd|h[1-6]|blockquote|pre|code|table|thead|tbody|tfoot|tr|td|th|",
    r"figure|figcaption|section|article|header|footer)\b",
    r#"(?:\s+[a-z][a-z0-9:-]*\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>]+))*\s*/?>"#,
);

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static BREAK_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| Regex::new(TAG_PATTERN).unwrap())
}

/// Whether `text` contains markup tags.
pub fn is_markup(text: &str) -> bool {
    tag_regex().is_match(text)
}

/// Plain text as it would be sent to the provider.
pub fn to_plain_text(text: &str) -> String {
    if is_markup(text) {
        strip_markup(text)
    } else {
        text.to_string()
    }
}

/// Strip tags, turning line breaks and block closers into newlines and
/// decoding the common entities.
///
/// Only recognized tags are removed; a stray `<` in the text survives.
pub fn strip_markup(html: &str) -> String {
    let breaks = BREAK_REGEX.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|blockquote|tr)\s*>").unwrap()
    });
    let tags = tag_regex();

    let with_breaks = breaks.replace_all(html, "\n");
    let stripped = tags.replace_all(&with_breaks, "");

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
