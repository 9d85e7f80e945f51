use registry_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Template rendering failed: {0}")]
    Template(#[from] askama::Error),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
