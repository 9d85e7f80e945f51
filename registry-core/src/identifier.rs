use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Digits each side of an `x`/`X` separator is padded to.
pub const SEPARATED_WIDTH: usize = 4;
/// Digits the part before a colon is padded to.
pub const COLON_WIDTH: usize = 5;
/// Prefix of the derived search query.
pub const DEFAULT_QUERY_LABEL: &str = "objektnummer = ";

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s;]+").expect("valid token split regex"));

/// Shape of a trimmed token, decided once before any padding happens.
///
/// The variants are mutually exclusive; every token has exactly one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// `left x right`, split at the first `x`/`X` (byte offset `at`).
    Separated { sep: char, at: usize },
    /// `left : right`, split at the first colon (byte offset `at`).
    Colon { at: usize },
    Unshaped,
}

/// Classify a token that has already been trimmed.
///
/// A colon anywhere disables the separator rule, so a token carrying both
/// `x` and `:` is treated as a colon token.
pub fn classify(token: &str) -> TokenShape {
    if !token.contains(':') {
        if let Some((at, sep)) = token.char_indices().find(|(_, c)| matches!(c, 'x' | 'X')) {
            let left = &token[..at];
            let right = &token[at + sep.len_utf8()..];
            if !left.is_empty() && !right.is_empty() {
                return TokenShape::Separated { sep, at };
            }
        }
    }

    match token.find(':') {
        Some(at) => TokenShape::Colon { at },
        None => TokenShape::Unshaped,
    }
}

/// Prefix `part` with zeros until it holds `target_digits` ASCII digits.
///
/// Letters are never removed and never count towards the target.
pub fn pad_ignoring_letters(part: &str, target_digits: usize) -> String {
    let digits = part.chars().filter(|c| c.is_ascii_digit()).count();
    if digits >= target_digits {
        return part.to_string();
    }
    let mut padded = "0".repeat(target_digits - digits);
    padded.push_str(part);
    padded
}

/// Normalize one archive identifier.
///
/// ```
/// use registry_core::normalize_token;
///
/// assert_eq!(normalize_token("217x54"), "0217x0054");
/// assert_eq!(normalize_token("217:abc"), "00217:abc");
/// assert_eq!(normalize_token("ABC123"), "ABC123");
/// ```
pub fn normalize_token(token: &str) -> String {
    let s = token.trim();
    match classify(s) {
        TokenShape::Separated { sep, at } => {
            let left = pad_ignoring_letters(&s[..at], SEPARATED_WIDTH);
            let right = pad_ignoring_letters(&s[at + sep.len_utf8()..], SEPARATED_WIDTH);
            format!("{left}{sep}{right}")
        }
        TokenShape::Colon { at } => {
            let left = pad_ignoring_letters(&s[..at], COLON_WIDTH);
            format!("{left}:{}", &s[at + 1..])
        }
        TokenShape::Unshaped => s.to_string(),
    }
}

/// Split pasted free text into raw tokens.
///
/// Commas, semicolons and any whitespace (including line breaks) separate
/// tokens; empty pieces are dropped.
pub fn split_tokens(text: &str) -> Vec<&str> {
    TOKEN_SPLIT
        .split(text.trim())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Result of normalizing a batch of tokens from free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNormalization {
    /// `(before, after)` for every input token, in input order.
    pub pairs: Vec<(String, String)>,
    /// Ready-to-paste search query; empty when no token survived.
    pub query: String,
}

impl TextNormalization {
    /// Normalize already-split tokens.
    pub fn from_tokens<I, S>(tokens: I, query_label: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = tokens
            .into_iter()
            .map(|t| {
                let raw = t.as_ref();
                (raw.to_string(), normalize_token(raw))
            })
            .collect();

        let non_empty: Vec<&str> = pairs
            .iter()
            .map(|(_, after)| after.as_str())
            .filter(|after| !after.trim().is_empty())
            .collect();

        let query = if non_empty.is_empty() {
            String::new()
        } else {
            format!("{}{}", query_label, non_empty.join(", "))
        };

        Self { pairs, query }
    }

    /// Normalized tokens in input order, empties included.
    pub fn normalized(&self) -> Vec<&str> {
        self.pairs.iter().map(|(_, after)| after.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Split free text and normalize every token (the "Tekst" tab).
pub fn normalize_text(text: &str, query_label: &str) -> TextNormalization {
    TextNormalization::from_tokens(split_tokens(text), query_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_rule_pads_both_sides() {
        assert_eq!(normalize_token("0217x0054"), "0217x0054");
        assert_eq!(normalize_token("217x54"), "0217x0054");
        assert_eq!(normalize_token("217X54"), "0217X0054");
    }

    #[test]
    fn test_padding_is_a_prefix_not_per_digit_group() {
        // Letters stay where they are; zeros go in front of the whole part.
        assert_eq!(normalize_token("AB1x99"), "000AB1x0099");
        assert_eq!(pad_ignoring_letters("AB1", 4), "000AB1");
        assert_eq!(pad_ignoring_letters("12345", 4), "12345");
    }

    #[test]
    fn test_separator_rule_splits_on_first_x_only() {
        assert_eq!(normalize_token("12x34x56"), "0012x34x56");
    }

    #[test]
    fn test_colon_rule() {
        assert_eq!(normalize_token("217:abc"), "00217:abc");
        assert_eq!(normalize_token("217:5"), "00217:5");
        assert_eq!(normalize_token("123456:1"), "123456:1");
    }

    #[test]
    fn test_colon_wins_over_separator() {
        assert_eq!(classify("12x3:4"), TokenShape::Colon { at: 4 });
        assert_eq!(normalize_token("12x3:4"), "0012x3:4");
    }

    #[test]
    fn test_unshaped_tokens_are_trimmed_only() {
        assert_eq!(normalize_token("ABC123"), "ABC123");
        assert_eq!(normalize_token("  ABC123 "), "ABC123");
        assert_eq!(normalize_token("   "), "");
        assert_eq!(normalize_token(""), "");
    }

    #[test]
    fn test_separator_with_empty_side_is_unshaped() {
        assert_eq!(classify("x12"), TokenShape::Unshaped);
        assert_eq!(classify("12x"), TokenShape::Unshaped);
        assert_eq!(normalize_token("12x"), "12x");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "217x54", "AB1x99", "12x34x56", "217:abc", "12x3:4", "ABC123", "  9 ", "",
            "x", "Axel", "1:2:3", "7X7", "000000x1", "ÆØ5x6", ":", "a:b",
        ];
        for t in samples {
            let once = normalize_token(t);
            assert_eq!(normalize_token(&once), once, "not idempotent for {t:?}");
        }
    }

    #[test]
    fn test_split_tokens() {
        let tokens = split_tokens(" 217x54, 12:3;\n\nAB1x99\t  5 ");
        assert_eq!(tokens, vec!["217x54", "12:3", "AB1x99", "5"]);
        assert!(split_tokens("  \n ").is_empty());
    }

    #[test]
    fn test_normalize_text_builds_query() {
        let result = normalize_text("217x54 12:3", DEFAULT_QUERY_LABEL);
        assert_eq!(result.normalized(), vec!["0217x0054", "00012:3"]);
        assert_eq!(result.query, "objektnummer = 0217x0054, 00012:3");
    }

    #[test]
    fn test_empty_tokens_are_left_out_of_query() {
        let result = TextNormalization::from_tokens(["217x54", "  ", "5"], "q: ");
        assert_eq!(result.pairs.len(), 3);
        assert_eq!(result.pairs[1].1, "");
        assert_eq!(result.query, "q: 0217x0054, 5");

        let nothing = TextNormalization::from_tokens(["", " "], "q: ");
        assert_eq!(nothing.query, "");
    }
}
