use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TgError>;

/// Error type for geometry parsing, construction, and spatial index operations.
#[derive(Debug, Error)]
pub enum TgError {
    /// Malformed WKT, WKB, or GeoJSON input.
    #[error("ParseError: {0}")]
    Parse(String),
    /// Argument of the wrong kind, such as a non-numeric coordinate.
    #[error("TypeError: {0}")]
    Type(String),
    /// Structurally wrong argument, such as a polygon where a point is required.
    #[error("ValueError: {0}")]
    Value(String),
    /// Operation the spatial index does not support.
    #[error("UnsupportedOperationError: {0}")]
    Unsupported(String),
    /// Error raised by the host SQLite connection.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// JSON encoding or decoding error outside of GeoJSON parsing.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TgError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        TgError::Parse(msg.into())
    }

    pub(crate) fn value(msg: impl Into<String>) -> Self {
        TgError::Value(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        TgError::Unsupported(msg.into())
    }

    /// Converts the error into the form scalar and aggregate functions report to SQLite.
    pub fn into_function_error(self) -> rusqlite::Error {
        match self {
            TgError::Sqlite(err) => err,
            other => rusqlite::Error::UserFunctionError(Box::new(other)),
        }
    }

    /// Converts the error into the form virtual table callbacks report to SQLite.
    pub fn into_module_error(self) -> rusqlite::Error {
        match self {
            TgError::Sqlite(rusqlite::Error::ModuleError(msg)) => rusqlite::Error::ModuleError(msg),
            TgError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(msg))) => {
                rusqlite::Error::ModuleError(msg)
            }
            other => rusqlite::Error::ModuleError(other.to_string()),
        }
    }
}
