//! Translation metrics and observability.
//!
//! Counters for provider traffic, quota consumption and batch outcomes. One
//! instance is owned by each orchestrator and shared with its adapters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Translation counters.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of calls made to the translation provider
    provider_calls: AtomicUsize,

    /// Number of provider calls that failed
    provider_failures: AtomicUsize,

    /// Characters debited from tenant quotas
    characters_consumed: AtomicU64,

    /// Batches that persisted at least one translation
    batches_translated: AtomicUsize,

    /// Batches that ended without persisting anything
    batches_skipped: AtomicUsize,

    /// Batches rejected by the quota gate
    quota_rejections: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call to the translation provider.
    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed provider call.
    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed batch and the characters it consumed.
    pub fn record_batch_translated(&self, characters: u64) {
        self.batches_translated.fetch_add(1, Ordering::Relaxed);
        self.characters_consumed
            .fetch_add(characters, Ordering::Relaxed);
    }

    pub fn record_batch_skipped(&self) {
        self.batches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> usize {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn characters_consumed(&self) -> u64 {
        self.characters_consumed.load(Ordering::Relaxed)
    }

    pub fn batches_translated(&self) -> usize {
        self.batches_translated.load(Ordering::Relaxed)
    }

    pub fn batches_skipped(&self) -> usize {
        self.batches_skipped.load(Ordering::Relaxed)
    }

    pub fn quota_rejections(&self) -> usize {
        self.quota_rejections.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let calls = self.provider_calls();
        let failures = self.provider_failures();
        let provider_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
            characters_consumed: self.characters_consumed(),
            batches_translated: self.batches_translated(),
            batches_skipped: self.batches_skipped(),
            quota_rejections: self.quota_rejections(),
        }
    }
}

/// Snapshot of the translation counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub provider_calls: usize,
    pub provider_failures: usize,

    /// Provider success rate as a percentage (0-100)
    pub provider_success_rate: f64,

    pub characters_consumed: u64,
    pub batches_translated: usize,
    pub batches_skipped: usize,
    pub quota_rejections: usize,
}
