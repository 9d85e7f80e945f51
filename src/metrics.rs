//! Prometheus metrics for the registry tools.
//!
//! Metric names live in [`MetricName`] so handlers and the CLI never pass
//! raw strings to the `metrics` macros.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalizer
    TokensNormalized,
    TextBatchesNormalized,
    TablesNormalized,

    // Merge
    MergesCompleted,
    MergeRowsExact,
    MergeRowsFallback,
    MergeRowsUnmatched,
    MergeShadowedDuplicates,

    // Download tokens
    PayloadsStored,
    PayloadsDownloaded,
    PayloadsExpired,

    UploadErrors,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::TokensNormalized => "registry_normalize_tokens_total",
            MetricName::TextBatchesNormalized => "registry_normalize_text_batches_total",
            MetricName::TablesNormalized => "registry_normalize_tables_total",
            MetricName::MergesCompleted => "registry_merge_completed_total",
            MetricName::MergeRowsExact => "registry_merge_rows_exact_total",
            MetricName::MergeRowsFallback => "registry_merge_rows_fallback_total",
            MetricName::MergeRowsUnmatched => "registry_merge_rows_unmatched_total",
            MetricName::MergeShadowedDuplicates => "registry_merge_shadowed_duplicates_total",
            MetricName::PayloadsStored => "registry_payloads_stored_total",
            MetricName::PayloadsDownloaded => "registry_payloads_downloaded_total",
            MetricName::PayloadsExpired => "registry_payloads_expired_total",
            MetricName::UploadErrors => "registry_upload_errors_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            TokensNormalized,
            TextBatchesNormalized,
            TablesNormalized,
            MergesCompleted,
            MergeRowsExact,
            MergeRowsFallback,
            MergeRowsUnmatched,
            MergeShadowedDuplicates,
            PayloadsStored,
            PayloadsDownloaded,
            PayloadsExpired,
            UploadErrors,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                for name in MetricName::all_metrics() {
                    ::metrics::counter!(name.as_str()).increment(0);
                }
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Text exposition of all metrics, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub fn emit_counter(name: MetricName, value: u64) {
    ::metrics::counter!(name.as_str()).increment(value);
}
