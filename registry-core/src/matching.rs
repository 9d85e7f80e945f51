use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::options::KeyOptions;

/// Which lookup produced a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    BaseKey,
    Unresolved,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::BaseKey => "base_key",
            MatchTier::Unresolved => "unresolved",
        }
    }
}

/// Outcome of resolving one raw key against a [`KeyMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub raw_key: Option<String>,
    pub normalized_key: Option<String>,
    pub label: Option<String>,
    pub tier: MatchTier,
}

impl MatchResult {
    fn unresolved(raw_key: Option<&str>, normalized_key: Option<String>) -> Self {
        Self {
            raw_key: raw_key.map(str::to_string),
            normalized_key,
            label: None,
            tier: MatchTier::Unresolved,
        }
    }

    pub fn is_match(&self) -> bool {
        self.label.is_some()
    }
}

/// Aggregate counts over a resolved batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub exact: usize,
    pub fallback: usize,
}

impl MatchStats {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut stats = MatchStats {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.tier {
                MatchTier::Exact => stats.exact += 1,
                MatchTier::BaseKey => stats.fallback += 1,
                MatchTier::Unresolved => {}
            }
        }
        stats.matched = stats.exact + stats.fallback;
        stats.unmatched = stats.total - stats.matched;
        stats
    }
}

/// Lookup from normalized keys (and optionally base keys) to labels.
///
/// Built fresh for every merge. The first row that produces a key owns it;
/// later rows with the same key are counted as shadowed and otherwise
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub full: HashMap<String, String>,
    pub base: HashMap<String, String>,
    /// Rows whose normalized key was already taken.
    pub shadowed_full: usize,
    /// Rows whose base key was already taken.
    pub shadowed_base: usize,
    /// Rows without a usable key or label.
    pub skipped_rows: usize,
}

impl KeyMapping {
    /// Build a mapping from `(key, label)` rows.
    pub fn build<'a, I>(rows: I, options: &KeyOptions) -> Self
    where
        I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
    {
        let mut mapping = KeyMapping::default();

        for (raw_key, raw_label) in rows {
            let (Some(raw_key), Some(label)) = (non_blank(raw_key), non_blank(raw_label)) else {
                mapping.skipped_rows += 1;
                continue;
            };

            let key = options.normalize_key(raw_key);
            if key.is_empty() {
                mapping.skipped_rows += 1;
                continue;
            }

            if options.use_base_key_fallback {
                if let Some(base) = KeyOptions::base_key(&key) {
                    if mapping.base.contains_key(&base) {
                        mapping.shadowed_base += 1;
                    } else {
                        mapping.base.insert(base, label.to_string());
                    }
                }
            }

            if mapping.full.contains_key(&key) {
                mapping.shadowed_full += 1;
                debug!("Duplicate key '{}' ignored, first label kept", key);
            } else {
                mapping.full.insert(key, label.to_string());
            }
        }

        debug!(
            "Built key mapping: {} keys, {} base keys, {} shadowed, {} skipped",
            mapping.full.len(),
            mapping.base.len(),
            mapping.shadowed_full,
            mapping.skipped_rows
        );

        mapping
    }

    /// Resolve one raw key: exact key first, then the base key if allowed.
    pub fn resolve(&self, raw_key: Option<&str>, options: &KeyOptions) -> MatchResult {
        let Some(raw) = non_blank(raw_key) else {
            return MatchResult::unresolved(raw_key, None);
        };

        let key = options.normalize_key(raw);
        if let Some(label) = self.full.get(&key) {
            return MatchResult {
                raw_key: Some(raw.to_string()),
                normalized_key: Some(key),
                label: Some(label.clone()),
                tier: MatchTier::Exact,
            };
        }

        if options.use_base_key_fallback {
            if let Some(label) = KeyOptions::base_key(&key).and_then(|b| self.base.get(&b)) {
                return MatchResult {
                    raw_key: Some(raw.to_string()),
                    normalized_key: Some(key),
                    label: Some(label.clone()),
                    tier: MatchTier::BaseKey,
                };
            }
        }

        MatchResult::unresolved(Some(raw), Some(key))
    }

    /// Resolve a batch of raw keys and count the outcome.
    pub fn resolve_all<'a, I>(&self, keys: I, options: &KeyOptions) -> (Vec<MatchResult>, MatchStats)
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let results: Vec<MatchResult> = keys.into_iter().map(|k| self.resolve(k, options)).collect();
        let stats = MatchStats::from_results(&results);
        (results, stats)
    }

    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
