//! Core of the registry office tools: archive identifier normalization and
//! the key matcher used to merge two tables on a normalized key column.
//!
//! Everything in this crate is pure; callers own all I/O.

pub mod columns;
pub mod common;
pub mod identifier;
pub mod matching;
pub mod options;
pub mod table;

pub use common::error::{CoreError, Result};
pub use identifier::{normalize_text, normalize_token, TextNormalization, TokenShape};
pub use matching::{KeyMapping, MatchResult, MatchStats, MatchTier};
pub use options::KeyOptions;
pub use table::{ColumnNormalization, MergeOutcome, MergeRequest, Table};
