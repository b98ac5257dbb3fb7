//! Authentication and session lifecycle.
//!
//! Password hashing, JWT issuance and verification, the refresh-token
//! session store and the [`service::AuthService`] orchestrating them.

pub mod config;
pub mod jwt;
pub mod memory;
pub mod non_fatal;
pub mod password;
pub mod queries;
pub mod service;
pub mod store;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User account is not active")]
    UserNotActive,

    #[error("Email already exists")]
    EmailExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error ({context}): {source}")]
    Db {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Wrap a store error with the operation that produced it.
    pub fn db(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| AuthError::Db { context, source }
    }
}
