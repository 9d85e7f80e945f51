use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Table has no header or no data rows")]
    EmptyTable,

    #[error("Table is not valid UTF-8 text: {0}")]
    Encoding(String),

    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
