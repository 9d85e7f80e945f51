use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::columns::{guess_key_column, guess_label_column, resolve_column};
use crate::common::error::{CoreError, Result};
use crate::identifier::normalize_token;
use crate::matching::{KeyMapping, MatchResult, MatchStats};
use crate::options::KeyOptions;

/// Suffix of the column added by [`normalize_column`].
pub const NORMALIZED_SUFFIX: &str = "_normaliseret";
pub const MAPPING_BEFORE: &str = "Før";
pub const MAPPING_AFTER: &str = "Efter";

/// A header row plus data rows; blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    /// Parse delimited text exported from a spreadsheet.
    ///
    /// The delimiter is sniffed from the header line: tab, then `;`, then `,`.
    /// Double-quoted fields may contain delimiters, quotes (`""`) and line
    /// breaks. Fully blank lines are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| CoreError::Encoding(e.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let delimiter = sniff_delimiter(text);
        let mut records = split_records(text, delimiter)?
            .into_iter()
            .filter(|(_, fields)| fields.iter().any(|f| !f.trim().is_empty()));

        let (_, header_fields) = records.next().ok_or(CoreError::EmptyTable)?;
        let headers: Vec<String> = header_fields
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = h.trim();
                if h.is_empty() {
                    format!("Kolonne {}", i + 1)
                } else {
                    h.to_string()
                }
            })
            .collect();

        let mut rows = Vec::new();
        for (line, fields) in records {
            if fields.len() > headers.len() && fields[headers.len()..].iter().any(|f| !f.trim().is_empty()) {
                return Err(CoreError::MalformedRow {
                    line,
                    message: format!("{} cells but only {} columns", fields.len(), headers.len()),
                });
            }
            let mut row: Vec<Option<String>> = fields
                .into_iter()
                .take(headers.len())
                .map(|f| if f.trim().is_empty() { None } else { Some(f) })
                .collect();
            row.resize(headers.len(), None);
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(CoreError::EmptyTable);
        }

        debug!("Parsed table: {} columns, {} rows, delimiter {:?}", headers.len(), rows.len(), delimiter);
        Ok(Self { headers, rows })
    }

    /// Render as delimited text with a trailing newline.
    pub fn to_delimited(&self, delimiter: char) -> String {
        let mut out = String::new();
        write_record(&mut out, self.headers.iter().map(|h| Some(h.as_str())), delimiter);
        for row in &self.rows {
            write_record(&mut out, row.iter().map(|c| c.as_deref()), delimiter);
        }
        out
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|c| c.as_deref()))
    }

    /// Append a column; the name gets a numeric suffix if it is taken.
    ///
    /// Returns the name actually used.
    pub fn push_column(&mut self, name: &str, values: Vec<Option<String>>) -> String {
        let name = self.unique_header(name);
        self.headers.push(name.clone());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().flatten());
        }
        name
    }

    /// First `n` rows with the same headers.
    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn unique_header(&self, wanted: &str) -> String {
        if !self.headers.iter().any(|h| h == wanted) {
            return wanted.to_string();
        }
        (2..)
            .map(|n| format!("{wanted}_{n}"))
            .find(|candidate| !self.headers.iter().any(|h| h == candidate))
            .unwrap_or_else(|| wanted.to_string())
    }
}

/// Count candidate delimiters in the header record, outside quoted fields.
fn sniff_delimiter(text: &str) -> char {
    let (mut tabs, mut semicolons, mut commas) = (0, 0, 0);
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\r' | '\n' if !in_quotes => break,
            '\t' if !in_quotes => tabs += 1,
            ';' if !in_quotes => semicolons += 1,
            ',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    if tabs > 0 {
        '\t'
    } else if semicolons > 0 && semicolons >= commas {
        ';'
    } else {
        ','
    }
}

/// Split text into `(line number, fields)` records.
fn split_records(text: &str, delimiter: char) -> Result<Vec<(usize, Vec<String>)>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            c if c == delimiter => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CoreError::MalformedRow {
            line: record_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}

fn write_record<'a, I>(out: &mut String, cells: I, delimiter: char)
where
    I: Iterator<Item = Option<&'a str>>,
{
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(delimiter);
        }
        first = false;
        let cell = cell.unwrap_or("");
        if cell.contains(delimiter) || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

/// Output of normalizing one identifier column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNormalization {
    /// Input table plus the normalized column.
    pub table: Table,
    /// Column that was read.
    pub source_column: String,
    /// Column that was added.
    pub normalized_column: String,
    /// Whether `source_column` was guessed rather than requested.
    pub guessed: bool,
    /// Two-column before/after table, when requested.
    pub mapping: Option<Table>,
    /// Cells whose value changed.
    pub changed: usize,
}

/// Normalize every cell of one column (the "Excel" tab).
///
/// Blank cells stay blank in the new column.
pub fn normalize_column(table: &Table, column: Option<&str>, with_mapping: bool) -> Result<ColumnNormalization> {
    let index = resolve_column(&table.headers, column, guess_key_column)?;
    let guessed = column.map_or(true, |c| c.trim().is_empty());
    let source_column = table.headers[index].clone();

    let before: Vec<Option<String>> = table.column(index).map(|c| c.map(str::to_string)).collect();
    let after: Vec<Option<String>> = before.iter().map(|c| c.as_deref().map(normalize_token)).collect();
    let changed = before
        .iter()
        .zip(&after)
        .filter(|(b, a)| b.is_some() && b != a)
        .count();

    let mapping = with_mapping.then(|| {
        Table::new(
            vec![MAPPING_BEFORE.to_string(), MAPPING_AFTER.to_string()],
            before.iter().cloned().zip(after.iter().cloned()).map(|(b, a)| vec![b, a]).collect(),
        )
    });

    let mut output = table.clone();
    let normalized_column = output.push_column(&format!("{source_column}{NORMALIZED_SUFFIX}"), after);

    Ok(ColumnNormalization {
        table: output,
        source_column,
        normalized_column,
        guessed,
        mapping,
        changed,
    })
}

/// Columns and options for joining a target table onto a source table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRequest {
    pub source_key: Option<String>,
    pub source_label: Option<String>,
    pub target_key: Option<String>,
    pub options: KeyOptions,
}

/// Output of [`merge_tables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Target table plus the resolved label column.
    pub table: Table,
    pub results: Vec<MatchResult>,
    pub stats: MatchStats,
    pub source_key_column: String,
    pub source_label_column: String,
    pub target_key_column: String,
    pub label_column: String,
    /// Source rows dropped because their normalized key was already taken.
    pub shadowed_duplicates: usize,
    /// Source rows without a usable key or label.
    pub skipped_source_rows: usize,
}

/// Look up a label for every target row via the source table.
pub fn merge_tables(source: &Table, target: &Table, request: &MergeRequest) -> Result<MergeOutcome> {
    let key_idx = resolve_column(&source.headers, request.source_key.as_deref(), guess_key_column)?;
    let label_idx = resolve_column(&source.headers, request.source_label.as_deref(), guess_label_column)?;
    let target_idx = resolve_column(&target.headers, request.target_key.as_deref(), guess_key_column)?;

    let options = &request.options;
    let mapping = KeyMapping::build(source.column(key_idx).zip(source.column(label_idx)), options);
    let (results, stats) = mapping.resolve_all(target.column(target_idx), options);

    let source_label_column = source.headers[label_idx].clone();
    let mut table = target.clone();
    let labels = results.iter().map(|r| r.label.clone()).collect();
    let label_column = table.push_column(&source_label_column, labels);

    debug!(
        "Merged {} target rows against {} source keys: {} exact, {} fallback, {} unmatched",
        stats.total,
        mapping.len(),
        stats.exact,
        stats.fallback,
        stats.unmatched
    );

    Ok(MergeOutcome {
        table,
        results,
        stats,
        source_key_column: source.headers[key_idx].clone(),
        source_label_column,
        target_key_column: target.headers[target_idx].clone(),
        label_column,
        shadowed_duplicates: mapping.shadowed_full,
        skipped_source_rows: mapping.skipped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    #[test]
    fn test_parse_semicolon_export() {
        let table = Table::parse("\u{feff}ObjektNr;Titel\r\n217x54;Maleri\r\n;Tom\r\n\r\n12:3;\r\n".as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["ObjektNr", "Titel"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0], cells(&["217x54", "Maleri"]));
        assert_eq!(table.rows[1], cells(&["", "Tom"]));
        assert_eq!(table.rows[2], cells(&["12:3", ""]));
    }

    #[test]
    fn test_parse_quoted_fields() {
        let table = Table::parse(b"Nr,Titel\n1x2,\"Maleri, olie\"\n3x4,\"Sagt \"\"hej\"\"\nanden linje\"\n").unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some("Maleri, olie"));
        assert_eq!(table.rows[1][1].as_deref(), Some("Sagt \"hej\"\nanden linje"));
    }

    #[test]
    fn test_parse_tab_and_ragged_rows() {
        let table = Table::parse(b"Nr\tTitel\tNote\n1x2\tA\n3x4\tB\tC\t\n").unwrap();
        assert_eq!(table.rows[0], cells(&["1x2", "A", ""]));
        assert_eq!(table.rows[1], cells(&["3x4", "B", "C"]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Table::parse(b""), Err(CoreError::EmptyTable));
        assert_eq!(Table::parse(b"Nr;Titel\n"), Err(CoreError::EmptyTable));
        assert!(matches!(Table::parse(&[0xff, 0xfe, 0x00]), Err(CoreError::Encoding(_))));
        assert!(matches!(
            Table::parse(b"Nr;Titel\n1;2;3\n"),
            Err(CoreError::MalformedRow { line: 2, .. })
        ));
        assert!(matches!(
            Table::parse(b"Nr;Titel\n\"1;2\n"),
            Err(CoreError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_parse_classic_mac_line_endings() {
        let table = Table::parse(b"Nr;Titel\r1x2;A\r3x4;B\r").unwrap();
        assert_eq!(table.headers, vec!["Nr", "Titel"]);
        assert_eq!(table.rows, vec![cells(&["1x2", "A"]), cells(&["3x4", "B"])]);
    }

    #[test]
    fn test_delimiter_inside_quoted_header_is_ignored() {
        let table = Table::parse(b"\"Nr; id\",Titel\n1x2,A\n").unwrap();
        assert_eq!(table.headers, vec!["Nr; id", "Titel"]);
        assert_eq!(table.rows[0], cells(&["1x2", "A"]));
    }

    #[test]
    fn test_to_delimited_quotes_when_needed() {
        let table = Table::new(
            vec!["Nr".to_string(), "Titel".to_string()],
            vec![cells(&["1x2", "a;b"]), cells(&["", "x\"y"])],
        );
        assert_eq!(table.to_delimited(';'), "Nr;Titel\n1x2;\"a;b\"\n;\"x\"\"y\"\n");

        let reparsed = Table::parse(table.to_delimited(';').as_bytes()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn test_normalize_column_guesses_and_adds_mapping() {
        let table = Table::parse(b"Titel;Arkivnummer\nMaleri;217x54\nTom;\nVase;00012:3\n").unwrap();
        let result = normalize_column(&table, None, true).unwrap();

        assert!(result.guessed);
        assert_eq!(result.source_column, "Arkivnummer");
        assert_eq!(result.normalized_column, "Arkivnummer_normaliseret");
        assert_eq!(result.changed, 1);
        assert_eq!(result.table.column(2).collect::<Vec<_>>(), vec![Some("0217x0054"), None, Some("00012:3")]);

        let mapping = result.mapping.unwrap();
        assert_eq!(mapping.headers, vec!["Før", "Efter"]);
        assert_eq!(mapping.rows[0], cells(&["217x54", "0217x0054"]));
    }

    #[test]
    fn test_normalize_column_explicit_and_missing() {
        let table = Table::parse(b"A;B\n1x1;x\n").unwrap();
        let result = normalize_column(&table, Some("a"), false).unwrap();
        assert!(!result.guessed);
        assert!(result.mapping.is_none());
        assert_eq!(result.table.rows[0][2].as_deref(), Some("0001x0001"));

        assert_eq!(
            normalize_column(&table, Some("C"), false).unwrap_err(),
            CoreError::ColumnNotFound("C".to_string())
        );
    }

    #[test]
    fn test_merge_tables() {
        let source = Table::parse(b"ObjektNr;Titel\n217x54;Maleri\n0217x0054;Kopi\n318:2;Vase\n").unwrap();
        let target = Table::parse(b"Nummer;Titel\n217X54;\n318:2.;\n999;\n").unwrap();

        let outcome = merge_tables(&source, &target, &MergeRequest::default()).unwrap();

        assert_eq!(outcome.source_key_column, "ObjektNr");
        assert_eq!(outcome.source_label_column, "Titel");
        assert_eq!(outcome.target_key_column, "Nummer");
        // target already has a "Titel" column
        assert_eq!(outcome.label_column, "Titel_2");
        assert_eq!(
            outcome.table.column(2).collect::<Vec<_>>(),
            vec![Some("Maleri"), Some("Vase"), None]
        );
        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.stats.unmatched, 1);
        assert_eq!(outcome.stats.fallback, 1);
        assert_eq!(outcome.shadowed_duplicates, 1);
    }
}
