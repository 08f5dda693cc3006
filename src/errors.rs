//! Error types shared by the storage layer and the external collaborators.
//!
//! Storage errors are backend-agnostic: the Mongo and in-memory repositories
//! both convert their failures into [`StoreError`].

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed to run an operation.
    #[error("database operation failed: {0}")]
    Database(String),

    /// A uniqueness rule was violated (holding symbol, open decision key).
    #[error("unique constraint violation: {0}")]
    Conflict(String),

    /// A stored record could not be mapped back into a domain type.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if crate::repositories::mongo::is_duplicate_key(&err) {
            StoreError::Conflict(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Failure fetching a daily close from the price feed.
///
/// The display strings are stable codes; they are returned verbatim in the
/// per-symbol refresh results.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("stooq_http_{0}")]
    Http(u16),

    #[error("stooq_request_failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("stooq_empty")]
    Empty,

    #[error("stooq_bad_csv")]
    BadCsv,

    #[error("stooq_bad_close")]
    BadClose,

    #[error("stooq_bad_date")]
    BadDate,
}

/// Failure fetching the exchange symbol directory.
#[derive(Error, Debug)]
pub enum SymbolSourceError {
    #[error("symbol_list_http_{0}")]
    Http(u16),

    #[error("symbol_list_request_failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolCheckError {
    #[error("symbol_not_allowed")]
    NotAllowed,

    #[error("symbol_list_unavailable")]
    Unavailable(String),
}

impl SymbolCheckError {
    pub fn code(&self) -> &'static str {
        match self {
            SymbolCheckError::NotAllowed => "symbol_not_allowed",
            SymbolCheckError::Unavailable(_) => "symbol_list_unavailable",
        }
    }
}
