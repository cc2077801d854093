pub mod cardgen;
pub mod config;
pub mod db;
pub mod exporter;
pub mod helpers;
pub mod importer;
pub mod model;
pub mod queue;
pub mod repository;
pub mod scheduler;
pub mod schema;
pub mod search;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Sqlx Error: {source}")]
    Sqlx { source: sqlx::Error },
    #[error("Io Error: {description}, {source}")]
    Io {
        description: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Library(#[from] LibraryError),
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::Sqlx { source }
    }
}

/// `LibraryError` is `Clone` so it can be attached to per-record import
/// results (`Error` is not, since `sqlx::Error` isn't).
#[derive(Clone, Debug, Diagnostic, Error)]
pub enum LibraryError {
    #[error("{0}")]
    NotFound(NotFoundKind),
    #[error("{description}")]
    ValidationError {
        description: String,
        fields: Vec<String>,
    },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Readonly mode refuses mutating operation `{0}`.")]
    ReadonlyRefused(String),
    #[error("{0}")]
    Search(String),
}

#[derive(Clone, Debug, Error)]
pub enum NotFoundKind {
    #[error("No deck with id `{0}`.")]
    Deck(i64),
    #[error("No note with id `{0}`.")]
    Note(i64),
    #[error("No card with id `{0}`.")]
    Card(i64),
}
