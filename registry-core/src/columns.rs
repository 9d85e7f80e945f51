use crate::common::error::{CoreError, Result};

/// Header fragments that usually mark the identifier column.
pub const KEY_COLUMN_HINTS: &[&str] = &["nummer", "objekt", "id", "arkiv"];

/// Header fragments that usually mark a human-readable label column.
pub const LABEL_COLUMN_HINTS: &[&str] = &[
    "titel",
    "title",
    "navn",
    "name",
    "betegnelse",
    "beskrivelse",
    "label",
];

fn find_by_hints<S: AsRef<str>>(headers: &[S], hints: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();
    hints
        .iter()
        .find_map(|hint| lowered.iter().position(|h| h.contains(hint)))
}

/// Guess the key column; falls back to the first column.
pub fn guess_key_column<S: AsRef<str>>(headers: &[S]) -> Option<usize> {
    if headers.is_empty() {
        return None;
    }
    Some(find_by_hints(headers, KEY_COLUMN_HINTS).unwrap_or(0))
}

/// Guess the label column; falls back to the second column, then the first.
pub fn guess_label_column<S: AsRef<str>>(headers: &[S]) -> Option<usize> {
    match headers.len() {
        0 => None,
        1 => Some(0),
        _ => Some(find_by_hints(headers, LABEL_COLUMN_HINTS).unwrap_or(1)),
    }
}

/// Pick a column by explicit name, or by `guess` when no name was given.
///
/// Names match exactly first, then case-insensitively after trimming.
pub fn resolve_column<S, F>(headers: &[S], requested: Option<&str>, guess: F) -> Result<usize>
where
    S: AsRef<str>,
    F: Fn(&[S]) -> Option<usize>,
{
    match requested.map(str::trim).filter(|r| !r.is_empty()) {
        Some(name) => headers
            .iter()
            .position(|h| h.as_ref() == name)
            .or_else(|| {
                let wanted = name.to_lowercase();
                headers
                    .iter()
                    .position(|h| h.as_ref().trim().to_lowercase() == wanted)
            })
            .ok_or_else(|| CoreError::ColumnNotFound(name.to_string())),
        None => guess(headers).ok_or(CoreError::EmptyTable),
    }
}
