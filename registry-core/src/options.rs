use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifier::normalize_token;

static TRAILING_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.,]0+$").expect("valid trailing float regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static LEADING_LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Alphabetic}+").expect("valid leading letters regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid digit run regex"));

/// Cleaning steps applied to a key before the identifier rules.
///
/// A merge borrows one value for both tables so the lookup side and the
/// resolving side always agree on what a key looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyOptions {
    /// Strip surrounding whitespace up front. The identifier rules always
    /// work on the trimmed key, so this only affects the steps before them.
    pub trim: bool,
    pub lowercase: bool,
    pub remove_punctuation: bool,
    pub collapse_whitespace: bool,
    /// Turn spreadsheet artifacts like `1234.0` back into `1234`.
    pub fix_trailing_float: bool,
    pub use_base_key_fallback: bool,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            trim: true,
            lowercase: true,
            remove_punctuation: false,
            collapse_whitespace: true,
            fix_trailing_float: true,
            use_base_key_fallback: true,
        }
    }
}

impl KeyOptions {
    /// Every cleaning step off; only the identifier rules run.
    pub fn strict() -> Self {
        Self {
            trim: false,
            lowercase: false,
            remove_punctuation: false,
            collapse_whitespace: false,
            fix_trailing_float: false,
            use_base_key_fallback: false,
        }
    }

    /// Clean `raw` with the enabled steps and apply the identifier rules.
    pub fn normalize_key(&self, raw: &str) -> String {
        let mut key = if self.trim {
            raw.trim().to_string()
        } else {
            raw.to_string()
        };

        if self.fix_trailing_float {
            if let Some(caps) = TRAILING_FLOAT.captures(key.trim()) {
                key = caps[1].to_string();
            }
        }

        if self.lowercase {
            key = key.to_lowercase();
        }

        if self.remove_punctuation {
            key = key
                .chars()
                .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == ':')
                .collect();
        }

        if self.collapse_whitespace {
            key = WHITESPACE_RUN.replace_all(&key, " ").into_owned();
        }

        normalize_token(&key)
    }

    /// Coarse fallback key: leading letters plus the first digit run.
    ///
    /// Returns `None` when the key yields neither.
    pub fn base_key(normalized: &str) -> Option<String> {
        let prefix = LEADING_LETTERS.find(normalized).map_or("", |m| m.as_str());
        let digits = DIGIT_RUN.find(normalized).map_or("", |m| m.as_str());
        if prefix.is_empty() && digits.is_empty() {
            return None;
        }
        Some(format!("{prefix}{digits}"))
    }
}
