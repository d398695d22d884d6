//! Error type for the access layer.

use thiserror::Error;

/// Failures surfaced by [`DbAccess`](crate::DbAccess).
///
/// Open and read failures pass the engine error through unchanged; write
/// failures carry the offending statement text alongside it.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine error, propagated as-is.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// A write statement failed to execute or commit.
    #[error("statement `{statement}` failed: {source}")]
    Statement {
        statement: String,
        source: rusqlite::Error,
    },
}

impl Error {
    pub(crate) fn statement(statement: &str, source: rusqlite::Error) -> Self {
        Self::Statement {
            statement: statement.to_owned(),
            source,
        }
    }
}
