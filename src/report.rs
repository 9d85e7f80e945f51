//! Glue shared by the CLI and the web handlers: run the core operations,
//! record metrics, and encode tables for download.

use registry_core::{MergeOutcome, Table, TextNormalization};
use tracing::info;

use crate::metrics::{emit_counter, MetricName};

/// Excel with a Danish locale opens `;`-separated files directly.
pub const OUTPUT_DELIMITER: char = ';';
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const NORMALIZED_FILENAME: &str = "arkivnummer_normaliseret.csv";
pub const MAPPING_FILENAME: &str = "arkivnummer_mapping.csv";
pub const MERGED_FILENAME: &str = "sammenflettet.csv";

pub fn normalize_text(text: &str, query_label: &str) -> TextNormalization {
    let result = registry_core::normalize_text(text, query_label);
    record_text(&result);
    result
}

pub fn normalize_tokens<S: AsRef<str>>(tokens: &[S], query_label: &str) -> TextNormalization {
    let result = TextNormalization::from_tokens(tokens, query_label);
    record_text(&result);
    result
}

fn record_text(result: &TextNormalization) {
    emit_counter(MetricName::TextBatchesNormalized, 1);
    emit_counter(MetricName::TokensNormalized, result.pairs.len() as u64);
}

pub fn record_merge(outcome: &MergeOutcome) {
    emit_counter(MetricName::MergesCompleted, 1);
    emit_counter(MetricName::MergeRowsExact, outcome.stats.exact as u64);
    emit_counter(MetricName::MergeRowsFallback, outcome.stats.fallback as u64);
    emit_counter(MetricName::MergeRowsUnmatched, outcome.stats.unmatched as u64);
    emit_counter(MetricName::MergeShadowedDuplicates, outcome.shadowed_duplicates as u64);
    info!(
        "Merge on '{}' -> '{}': {}/{} matched ({} exact, {} fallback), {} shadowed duplicates",
        outcome.target_key_column,
        outcome.label_column,
        outcome.stats.matched,
        outcome.stats.total,
        outcome.stats.exact,
        outcome.stats.fallback,
        outcome.shadowed_duplicates
    );
}

/// UTF-8 with a byte order mark so Excel does not guess the encoding.
pub fn encode_table(table: &Table) -> Vec<u8> {
    let mut bytes = "\u{feff}".as_bytes().to_vec();
    bytes.extend_from_slice(table.to_delimited(OUTPUT_DELIMITER).as_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_table_round_trips_through_parser() {
        let table = Table::new(
            vec!["Før".to_string(), "Efter".to_string()],
            vec![vec![Some("217x54".to_string()), Some("0217x0054".to_string())]],
        );
        let bytes = encode_table(&table);
        assert!(bytes.starts_with(&[0xef, 0xbb, 0xbf]));
        assert_eq!(Table::parse(&bytes).unwrap(), table);
    }

    #[test]
    fn test_normalize_tokens_keeps_order() {
        let result = normalize_tokens(&["5", "217x54"], "nr = ");
        assert_eq!(result.normalized(), vec!["5", "0217x0054"]);
        assert_eq!(result.query, "nr = 5, 0217x0054");
    }
}
