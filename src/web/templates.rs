use askama::Template;
use registry_core::{KeyOptions, MatchStats, Table};

/// Table preview with blank cells rendered as empty strings.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn preview(table: &Table, rows: usize) -> Self {
        let head = table.head(rows);
        Self {
            headers: head.headers,
            rows: head
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub current_page: &'static str,
}

/// Result of the "Excel" tab.
#[derive(Debug, Clone)]
pub struct ColumnView {
    pub preview: TableView,
    pub source_column: String,
    pub normalized_column: String,
    pub guessed: bool,
    pub changed: usize,
    pub rows: usize,
    pub payload_token: String,
    pub mapping_token: Option<String>,
}

#[derive(Template)]
#[template(path = "normalize.html")]
pub struct NormalizeTemplate {
    pub current_page: &'static str,
    pub tab: &'static str,
    pub inp: String,
    pub submitted: bool,
    /// One normalized token per line.
    pub normalized_text: String,
    pub pairs: Vec<(String, String)>,
    pub query: String,
    pub add_mapping: bool,
    pub column: String,
    pub alert: Option<String>,
    pub excel: Option<ColumnView>,
}

impl NormalizeTemplate {
    pub fn new(tab: &'static str) -> Self {
        Self {
            current_page: "tekstnormalisering",
            tab,
            inp: String::new(),
            submitted: false,
            normalized_text: String::new(),
            pairs: Vec::new(),
            query: String::new(),
            add_mapping: true,
            column: String::new(),
            alert: None,
            excel: None,
        }
    }
}

/// Result of a merge.
#[derive(Debug, Clone)]
pub struct MergeView {
    pub preview: TableView,
    pub stats: MatchStats,
    pub source_key_column: String,
    pub source_label_column: String,
    pub target_key_column: String,
    pub label_column: String,
    pub shadowed_duplicates: usize,
    pub skipped_source_rows: usize,
    pub payload_token: String,
}

#[derive(Template)]
#[template(path = "merge.html")]
pub struct MergeTemplate {
    pub current_page: &'static str,
    pub options: KeyOptions,
    pub source_key: String,
    pub source_label: String,
    pub target_key: String,
    pub alert: Option<String>,
    pub result: Option<MergeView>,
}

impl MergeTemplate {
    pub fn new(options: KeyOptions) -> Self {
        Self {
            current_page: "sammenfletter",
            options,
            source_key: String::new(),
            source_label: String::new(),
            target_key: String::new(),
            alert: None,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_limits_rows_and_blanks_cells() {
        let table = Table::new(
            vec!["Nr".to_string()],
            vec![vec![Some("1".to_string())], vec![None], vec![Some("3".to_string())]],
        );
        let view = TableView::preview(&table, 2);
        assert_eq!(view.rows, vec![vec!["1".to_string()], vec![String::new()]]);
    }

    #[test]
    fn test_normalize_template_renders_query() {
        let mut page = NormalizeTemplate::new("text");
        page.submitted = true;
        page.pairs = vec![("217x54".to_string(), "0217x0054".to_string())];
        page.normalized_text = "0217x0054".to_string();
        page.query = "objektnummer = 0217x0054".to_string();

        let html = page.render().unwrap();
        assert!(html.contains("objektnummer = 0217x0054"));
        assert!(html.contains("217x54 → 0217x0054"));
    }
}
