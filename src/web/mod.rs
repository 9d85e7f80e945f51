//! Web front end: the two tools as HTML pages plus a small JSON API.

pub mod forms;
pub mod handlers;
pub mod router;
pub mod state;
pub mod templates;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Result, ToolError};

pub use router::app_router;
pub use state::AppState;

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = match &self {
            ToolError::Upload(_) | ToolError::Core(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Bind and serve until the process is stopped.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ToolError::Config(format!("Invalid listen address: {e}")))?;

    let app = app_router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Web server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ToolError::Server(e.to_string()))
}
