//! Auto-translation pipeline run after every save of a registered content type.
//!
//! One save event is one batch: every (field, target language) pair is
//! translated first, then the batch passes the tenant's quota gate, and only
//! then are the touched per-language columns written, together with the quota
//! debit, in a single transaction. The author's own save is never affected by
//! anything that happens here.

use crate::db::{ContentEntity, Database, Tenant, TranslationWrite};
use crate::error::{ProviderError, TranslateError};
use crate::i18n::{LanguageSetResolver, TranslationMetrics};
use crate::provider::{to_plain_text, ProviderFactory, TranslationAdapter};
use crate::quota::QuotaLedger;
use crate::registry::TranslatableRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a save event produced no translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum SkipReason {
    /// Content type was never registered as translatable
    NotRegistered,
    /// Acting user belongs to no tenant
    NoTenant,
    TenantInactive,
    /// Tenant has no provider credential configured
    MissingCredential,
    /// Only the primary language is in effect
    NoTargetLanguages,
    /// No pair produced a translation (blank sources, unchanged sources or provider failures)
    NothingToTranslate,
    QuotaExceeded { requested: i64, remaining: i64 },
    Failed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail")]
pub enum SyncStatus {
    Translated,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error")]
pub enum PairStatus {
    Translated,
    /// Source unchanged since the last committed translation
    Unchanged,
    Failed(ProviderError),
    /// Not attempted because an earlier pair hit a batch-scoped error
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairResult {
    pub field: String,
    pub language: String,
    pub status: PairStatus,
    /// Characters this pair counts against the quota
    pub characters: i64,
}

impl PairResult {
    fn new(field: &str, language: &str, status: PairStatus, characters: i64) -> Self {
        Self {
            field: field.to_string(),
            language: language.to_string(),
            status,
            characters,
        }
    }
}

/// Record of one save event. Logged, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationOutcome {
    pub tenant_id: Option<i64>,
    pub content_type: String,
    pub entity_id: i64,
    pub is_new: bool,
    /// Target languages attempted, in resolution order
    pub languages: Vec<String>,
    pub characters: i64,
    pub pairs: Vec<PairResult>,
    pub status: SyncStatus,
    pub finished_at: DateTime<Utc>,
}

impl TranslationOutcome {
    fn new(content_type: &str, entity_id: i64, is_new: bool) -> Self {
        Self {
            tenant_id: None,
            content_type: content_type.to_string(),
            entity_id,
            is_new,
            languages: Vec::new(),
            characters: 0,
            pairs: Vec::new(),
            status: SyncStatus::Skipped(SkipReason::NothingToTranslate),
            finished_at: Utc::now(),
        }
    }

    pub fn is_translated(&self) -> bool {
        self.status == SyncStatus::Translated
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            SyncStatus::Skipped(reason) => Some(reason),
            SyncStatus::Translated => None,
        }
    }

    /// Pairs with the given status.
    pub fn count(&self, status: &PairStatus) -> usize {
        self.pairs.iter().filter(|p| &p.status == status).count()
    }
}

/// Hex sha256 of the plain source text.
pub fn hash_source(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Orchestrates translation of saved content.
pub struct AutoTranslator {
    db: Database,
    ledger: QuotaLedger,
    registry: Arc<TranslatableRegistry>,
    providers: Arc<dyn ProviderFactory>,
    resolver: LanguageSetResolver,
    metrics: Arc<TranslationMetrics>,
}

impl AutoTranslator {
    pub fn new(
        db: Database,
        registry: Arc<TranslatableRegistry>,
        providers: Arc<dyn ProviderFactory>,
        resolver: LanguageSetResolver,
    ) -> Self {
        Self {
            ledger: QuotaLedger::new(db.clone()),
            db,
            registry,
            providers,
            resolver,
            metrics: Arc::new(TranslationMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<TranslationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &TranslatableRegistry {
        &self.registry
    }

    /// Hook the content layer calls after every save of a registered type.
    ///
    /// Never fails: every problem is logged and reported as
    /// `SyncStatus::Skipped`, leaving the author's save as it was.
    pub async fn on_content_saved(
        &self,
        acting_user: i64,
        content_type: &str,
        entity: &ContentEntity,
        is_new: bool,
    ) -> TranslationOutcome {
        let mut outcome = TranslationOutcome::new(content_type, entity.id, is_new);

        let result = self
            .run_batch(acting_user, content_type, entity, is_new, &mut outcome)
            .await;
        outcome.status = match result {
            Ok(status) => status,
            Err(TranslateError::QuotaExceeded {
                requested,
                remaining,
                ..
            }) => {
                self.metrics.record_quota_rejection();
                SyncStatus::Skipped(SkipReason::QuotaExceeded {
                    requested,
                    remaining,
                })
            }
            Err(e) => {
                error!(
                    "Translation of {} #{} (tenant {:?}) failed: {}",
                    content_type, entity.id, outcome.tenant_id, e
                );
                SyncStatus::Skipped(SkipReason::Failed {
                    detail: e.to_string(),
                })
            }
        };
        outcome.finished_at = Utc::now();

        match &outcome.status {
            SyncStatus::Translated => self
                .metrics
                .record_batch_translated(outcome.characters.max(0) as u64),
            SyncStatus::Skipped(_) => self.metrics.record_batch_skipped(),
        }
        log_outcome(&outcome);

        outcome
    }

    /// Run [`on_content_saved`](Self::on_content_saved) on the runtime so
    /// provider latency never blocks the caller's save response.
    pub fn spawn_on_content_saved(
        self: &Arc<Self>,
        acting_user: i64,
        entity: ContentEntity,
        is_new: bool,
    ) -> JoinHandle<TranslationOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let content_type = entity.content_type.clone();
            this.on_content_saved(acting_user, &content_type, &entity, is_new)
                .await
        })
    }

    /// Re-run translation for a stored entity, as if the author re-saved it.
    ///
    /// Unlike the save hook this is an operator action, so an unregistered
    /// content type is an error rather than a skip.
    pub async fn resync(
        &self,
        acting_user: i64,
        content_type: &str,
        entity_id: i64,
    ) -> Result<Option<TranslationOutcome>, TranslateError> {
        if !self.registry.is_registered(content_type) {
            return Err(TranslateError::Configuration(format!(
                "content type '{}' is not translatable (registered: {:?})",
                content_type,
                self.registry.content_types()
            )));
        }
        let Some(entity) = self.db.load_entity(content_type, entity_id).await? else {
            return Ok(None);
        };
        Ok(Some(
            self.on_content_saved(acting_user, content_type, &entity, false)
                .await,
        ))
    }

    async fn run_batch(
        &self,
        acting_user: i64,
        content_type: &str,
        entity: &ContentEntity,
        is_new: bool,
        outcome: &mut TranslationOutcome,
    ) -> Result<SyncStatus, TranslateError> {
        if !self.registry.is_registered(content_type) {
            return Ok(SyncStatus::Skipped(SkipReason::NotRegistered));
        }

        let tenant = self.db.tenant_for_user(acting_user).await?;
        let (tenant, credential) = match check_tenant(tenant) {
            Ok(found) => found,
            Err(reason) => return Ok(SyncStatus::Skipped(reason)),
        };
        outcome.tenant_id = Some(tenant.id);

        let settings = self
            .db
            .language_settings(acting_user, self.resolver.default_language())
            .await?;
        let mut targets = self.resolver.resolve_supported(&settings);
        let primary = targets.remove(0);
        outcome.languages = targets.clone();
        if targets.is_empty() {
            return Ok(SyncStatus::Skipped(SkipReason::NoTargetLanguages));
        }

        let (hashes, stored) = if is_new {
            (HashMap::new(), None)
        } else {
            (
                self.db.source_hashes(content_type, entity.id).await?,
                self.db.load_entity(content_type, entity.id).await?,
            )
        };

        let adapter = TranslationAdapter::new(
            self.providers.for_tenant(&tenant, &credential),
            self.metrics.clone(),
        );

        let mut writes: Vec<TranslationWrite> = Vec::new();
        let mut aborted: Option<ProviderError> = None;

        for field in self.registry.fields(content_type) {
            let source = match entity.get(field.name()) {
                Some(raw) => to_plain_text(raw),
                None => continue,
            };
            if source.trim().is_empty() {
                continue;
            }
            let source_hash = hash_source(&source);
            let characters = source.chars().count() as i64;

            for language in &targets {
                let Some(column) = field.column_for(language) else {
                    continue;
                };

                if aborted.is_some() {
                    outcome.pairs.push(PairResult::new(
                        field.name(),
                        language,
                        PairStatus::Abandoned,
                        0,
                    ));
                    continue;
                }

                let hash_key = (field.name().to_string(), language.clone());
                let has_translation = stored
                    .as_ref()
                    .and_then(|e| e.get(column))
                    .is_some_and(|v| !v.trim().is_empty());
                if has_translation && hashes.get(&hash_key) == Some(&source_hash) {
                    debug!(
                        "{} #{}: {} -> {} unchanged, skipping",
                        content_type,
                        entity.id,
                        field.name(),
                        language
                    );
                    outcome.pairs.push(PairResult::new(
                        field.name(),
                        language,
                        PairStatus::Unchanged,
                        0,
                    ));
                    continue;
                }

                match adapter
                    .translate_plain_text(&source, &primary, language)
                    .await
                {
                    Ok(translated) => {
                        writes.push(TranslationWrite {
                            field: field.name().to_string(),
                            language: language.clone(),
                            column: column.to_string(),
                            value: translated,
                            source_hash: source_hash.clone(),
                        });
                        outcome.characters += characters;
                        outcome.pairs.push(PairResult::new(
                            field.name(),
                            language,
                            PairStatus::Translated,
                            characters,
                        ));
                    }
                    Err(e) => {
                        warn!(
                            "Tenant {}: {} #{} {} -> {} failed: {}",
                            tenant.id,
                            content_type,
                            entity.id,
                            field.name(),
                            language,
                            e
                        );
                        if e.is_batch_scoped() {
                            aborted = Some(e.clone());
                        }
                        outcome.pairs.push(PairResult::new(
                            field.name(),
                            language,
                            PairStatus::Failed(e),
                            0,
                        ));
                    }
                }
            }
        }

        if let Some(e) = &aborted {
            warn!(
                "Tenant {}: batch for {} #{} stopped early: {}",
                tenant.id, content_type, entity.id, e
            );
        }

        if writes.is_empty() {
            return Ok(SyncStatus::Skipped(SkipReason::NothingToTranslate));
        }

        let characters = outcome.characters;
        if !self.ledger.can_consume(tenant.id, characters).await? {
            return Err(self.quota_exceeded(&tenant, characters).await?);
        }

        let committed = self
            .db
            .commit_translations(tenant.id, content_type, entity.id, &writes, characters)
            .await?;
        if !committed {
            // Another batch for the same tenant consumed the headroom after the gate
            return Err(self.quota_exceeded(&tenant, characters).await?);
        }

        Ok(SyncStatus::Translated)
    }

    async fn quota_exceeded(
        &self,
        tenant: &Tenant,
        requested: i64,
    ) -> Result<TranslateError, TranslateError> {
        let remaining = self.ledger.remaining(tenant.id).await?;
        Ok(TranslateError::QuotaExceeded {
            tenant_id: tenant.id,
            requested,
            remaining,
        })
    }
}

/// Tenant plus credential, or the reason translation cannot run for it.
fn check_tenant(tenant: Option<Tenant>) -> Result<(Tenant, String), SkipReason> {
    let tenant = tenant.ok_or(SkipReason::NoTenant)?;
    if !tenant.is_active {
        return Err(SkipReason::TenantInactive);
    }
    let credential = tenant
        .credential()
        .map(str::to_string)
        .ok_or(SkipReason::MissingCredential)?;
    Ok((tenant, credential))
}

fn log_outcome(outcome: &TranslationOutcome) {
    match &outcome.status {
        SyncStatus::Translated => info!(
            "Tenant {:?}: translated {} #{} into {:?} ({} pairs, {} characters)",
            outcome.tenant_id,
            outcome.content_type,
            outcome.entity_id,
            outcome.languages,
            outcome.count(&PairStatus::Translated),
            outcome.characters
        ),
        SyncStatus::Skipped(SkipReason::QuotaExceeded {
            requested,
            remaining,
        }) => warn!(
            "Tenant {:?}: translation of {} #{} rejected by quota ({} requested, {} remaining), nothing written",
            outcome.tenant_id, outcome.content_type, outcome.entity_id, requested, remaining
        ),
        SyncStatus::Skipped(reason) => debug!(
            "Tenant {:?}: translation of {} #{} skipped: {:?}",
            outcome.tenant_id, outcome.content_type, outcome.entity_id, reason
        ),
    }

    match serde_json::to_string(outcome) {
        Ok(json) => debug!("Translation outcome: {}", json),
        Err(e) => debug!("Failed to serialize translation outcome: {}", e),
    }
}
