use askama::Template;
use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use registry_core::table::{merge_tables, normalize_column};
use registry_core::{KeyOptions, MergeRequest, Table, TextNormalization};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ToolError};
use crate::metrics::{emit_counter, MetricName};
use crate::report;
use crate::web::forms::{DownloadForm, TabQuery, TextForm, UploadForm};
use crate::web::state::AppState;
use crate::web::templates::{
    ColumnView, IndexTemplate, MergeTemplate, MergeView, NormalizeTemplate, TableView,
};

pub async fn index() -> Result<Html<String>> {
    let page = IndexTemplate { current_page: "index" };
    Ok(Html(page.render()?))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "registry_tools",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics() -> Response {
    match crate::metrics::render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

enum Tab {
    Text,
    Excel,
}

fn parse_tab(query: &TabQuery) -> Option<Tab> {
    match query.tab.as_deref().unwrap_or("text") {
        "text" => Some(Tab::Text),
        "excel" => Some(Tab::Excel),
        _ => None,
    }
}

fn redirect_to_text() -> Response {
    Redirect::to("/tekstnormalisering?tab=text").into_response()
}

pub async fn normalize_page(Query(query): Query<TabQuery>) -> Result<Response> {
    let page = match parse_tab(&query) {
        Some(Tab::Text) => NormalizeTemplate::new("text"),
        Some(Tab::Excel) => NormalizeTemplate::new("excel"),
        None => return Ok(redirect_to_text()),
    };
    Ok(Html(page.render()?).into_response())
}

/// Both tabs post to the same URL; the text tab sends a urlencoded form,
/// the excel tab a multipart upload.
pub async fn normalize_submit(
    State(state): State<AppState>,
    Query(query): Query<TabQuery>,
    request: Request,
) -> Result<Response> {
    let page = match parse_tab(&query) {
        Some(Tab::Text) => {
            let Form(form) = Form::<TextForm>::from_request(request, &state)
                .await
                .map_err(|e| ToolError::Upload(e.body_text()))?;
            normalize_text_tab(&state, form)
        }
        Some(Tab::Excel) => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| ToolError::Upload(e.body_text()))?;
            normalize_excel_tab(&state, UploadForm::read(multipart).await?)
        }
        None => return Ok(redirect_to_text()),
    };
    Ok(Html(page.render()?).into_response())
}

fn normalize_text_tab(state: &AppState, form: TextForm) -> NormalizeTemplate {
    let result = report::normalize_text(&form.inp, &state.config.normalize.query_label);

    let mut page = NormalizeTemplate::new("text");
    page.submitted = true;
    page.normalized_text = result.normalized().join("\n");
    page.pairs = result.pairs;
    page.query = result.query;
    page.inp = form.inp;
    page
}

fn normalize_excel_tab(state: &AppState, form: UploadForm) -> NormalizeTemplate {
    let mut page = NormalizeTemplate::new("excel");
    page.add_mapping = form.field("add_mapping") != Some("no");
    page.column = form.field("column").unwrap_or_default().to_string();

    let Some(file) = form.files.get("excel") else {
        return page;
    };

    let table = match Table::parse(&file.bytes) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not read uploaded table '{}': {}", file.filename, e);
            emit_counter(MetricName::UploadErrors, 1);
            page.alert = Some(format!("Kunne ikke læse filen: {e}"));
            return page;
        }
    };

    let column = form.field("column");
    let normalized = match normalize_column(&table, column, page.add_mapping) {
        Ok(normalized) => normalized,
        Err(e) => {
            page.alert = Some(format!("Kunne ikke normalisere: {e}"));
            return page;
        }
    };
    emit_counter(MetricName::TablesNormalized, 1);
    emit_counter(MetricName::TokensNormalized, table.len() as u64);
    info!(
        "Normalized column '{}' of '{}' ({} rows, {} changed)",
        normalized.source_column,
        file.filename,
        table.len(),
        normalized.changed
    );

    let payload_token = state.payloads.store(
        report::NORMALIZED_FILENAME,
        report::CSV_CONTENT_TYPE,
        report::encode_table(&normalized.table),
    );
    let mapping_token = normalized.mapping.as_ref().map(|mapping| {
        state.payloads.store(
            report::MAPPING_FILENAME,
            report::CSV_CONTENT_TYPE,
            report::encode_table(mapping),
        )
    });

    page.excel = Some(ColumnView {
        preview: TableView::preview(&table, state.config.server.preview_rows),
        source_column: normalized.source_column,
        normalized_column: normalized.normalized_column,
        guessed: normalized.guessed,
        changed: normalized.changed,
        rows: table.len(),
        payload_token,
        mapping_token,
    });
    page
}

pub async fn download(State(state): State<AppState>, Form(form): Form<DownloadForm>) -> Response {
    let Some(token) = form.payload_token.filter(|t| !t.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Mangler payload token").into_response();
    };
    let Some(payload) = state.payloads.take(token.trim()) else {
        return (StatusCode::GONE, "Token udløbet eller ugyldigt").into_response();
    };

    (
        [
            (header::CONTENT_TYPE, payload.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", payload.filename),
            ),
        ],
        payload.bytes,
    )
        .into_response()
}

pub async fn merge_page(State(state): State<AppState>) -> Result<Html<String>> {
    let page = MergeTemplate::new(state.config.merge);
    Ok(Html(page.render()?))
}

pub async fn merge_submit(State(state): State<AppState>, multipart: Multipart) -> Result<Html<String>> {
    let form = UploadForm::read(multipart).await?;

    let mut page = MergeTemplate::new(form.key_options());
    page.source_key = form.field("source_key").unwrap_or_default().to_string();
    page.source_label = form.field("source_label").unwrap_or_default().to_string();
    page.target_key = form.field("target_key").unwrap_or_default().to_string();

    let (Some(source_file), Some(target_file)) = (form.files.get("source"), form.files.get("target")) else {
        page.alert = Some("Vælg både et kildeark og et målark.".to_string());
        return Ok(Html(page.render()?));
    };

    let parsed = Table::parse(&source_file.bytes)
        .map_err(|e| format!("Kunne ikke læse kildearket: {e}"))
        .and_then(|source| {
            Table::parse(&target_file.bytes)
                .map(|target| (source, target))
                .map_err(|e| format!("Kunne ikke læse målarket: {e}"))
        });
    let (source, target) = match parsed {
        Ok(tables) => tables,
        Err(message) => {
            emit_counter(MetricName::UploadErrors, 1);
            page.alert = Some(message);
            return Ok(Html(page.render()?));
        }
    };

    let request = MergeRequest {
        source_key: form.field("source_key").map(str::to_string),
        source_label: form.field("source_label").map(str::to_string),
        target_key: form.field("target_key").map(str::to_string),
        options: page.options,
    };
    let outcome = match merge_tables(&source, &target, &request) {
        Ok(outcome) => outcome,
        Err(e) => {
            page.alert = Some(format!("Kunne ikke sammenflette: {e}"));
            return Ok(Html(page.render()?));
        }
    };
    report::record_merge(&outcome);

    let payload_token = state.payloads.store(
        report::MERGED_FILENAME,
        report::CSV_CONTENT_TYPE,
        report::encode_table(&outcome.table),
    );

    page.result = Some(MergeView {
        preview: TableView::preview(&outcome.table, state.config.server.preview_rows),
        stats: outcome.stats,
        source_key_column: outcome.source_key_column,
        source_label_column: outcome.source_label_column,
        target_key_column: outcome.target_key_column,
        label_column: outcome.label_column,
        shadowed_duplicates: outcome.shadowed_duplicates,
        skipped_source_rows: outcome.skipped_source_rows,
        payload_token,
    });
    Ok(Html(page.render()?))
}

#[derive(Debug, Deserialize)]
pub struct NormalizeApiRequest {
    pub text: Option<String>,
    pub tokens: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeApiResponse {
    pub normalized: Vec<String>,
    #[serde(flatten)]
    pub result: TextNormalization,
}

pub async fn api_normalize(
    State(state): State<AppState>,
    Json(request): Json<NormalizeApiRequest>,
) -> Json<NormalizeApiResponse> {
    let label = &state.config.normalize.query_label;
    let result = match (request.tokens, request.text) {
        (Some(tokens), _) => report::normalize_tokens(&tokens, label),
        (None, Some(text)) => report::normalize_text(&text, label),
        (None, None) => TextNormalization::default(),
    };
    Json(NormalizeApiResponse {
        normalized: result.normalized().into_iter().map(str::to_string).collect(),
        result,
    })
}

#[derive(Debug, Deserialize)]
pub struct MergeApiRequest {
    pub source: Table,
    pub target: Table,
    pub source_key: Option<String>,
    pub source_label: Option<String>,
    pub target_key: Option<String>,
    /// Falls back to the configured defaults.
    pub options: Option<KeyOptions>,
}

pub async fn api_merge(
    State(state): State<AppState>,
    Json(request): Json<MergeApiRequest>,
) -> Result<Json<registry_core::MergeOutcome>> {
    let merge = MergeRequest {
        source_key: request.source_key,
        source_label: request.source_label,
        target_key: request.target_key,
        options: request.options.unwrap_or(state.config.merge),
    };
    let outcome = merge_tables(&request.source, &request.target, &merge)?;
    report::record_merge(&outcome);
    Ok(Json(outcome))
}
