//! Todo persistence.

pub mod queries;
pub mod service;

use thiserror::Error;

/// Todo storage errors.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Todo {0} not found")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error ({context}): {source}")]
    Db {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl TodoError {
    /// Wrap a store error with the operation that produced it.
    pub fn db(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| TodoError::Db { context, source }
    }
}
