use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced column does not exist in the supplied table. This is an
    /// integration mistake and fails fast rather than rendering wrong numbers.
    #[error("column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("Invalid period value: {0}")]
    PeriodParse(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn missing_column(column: &str, table_columns: &[String]) -> Self {
        Error::MissingColumn {
            column: column.to_string(),
            available: table_columns.join(", "),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
