use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::web::handlers::{
    api_merge, api_normalize, download, health, index, merge_page, merge_submit, metrics,
    normalize_page, normalize_submit,
};
use crate::web::state::AppState;

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/tekstnormalisering", get(normalize_page).post(normalize_submit))
        .route("/tekstnormalisering/download", post(download))
        .route("/sammenfletter", get(merge_page).post(merge_submit))
        .route("/sammenfletter/download", post(download))
        .route("/api/normalize", post(api_normalize))
        .route("/api/merge", post(api_merge))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
