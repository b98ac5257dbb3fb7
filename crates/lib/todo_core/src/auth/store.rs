//! Persistence seams for users and refresh-token sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{NewUser, RefreshTokenRecord, User};

/// User lookup and creation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, returning the stored row.
    async fn create_user(&self, user: &NewUser) -> Result<User, AuthError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;

    /// Stamp `last_login_at`.
    async fn update_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError>;
}

/// Durable mapping from refresh-token string to owner and expiry.
///
/// The store is authoritative: a token that verifies cryptographically but
/// is absent here is revoked.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session. Fails if the token is already stored.
    async fn save_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Return the session only if it exists and `expires_at > now`.
    async fn find_valid_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Remove a session. Returns whether a row was removed; a missing token is not an error.
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AuthError>;

    /// Remove every session of a user, returning how many were removed.
    async fn delete_user_refresh_tokens(&self, user_id: i64) -> Result<u64, AuthError>;

    /// Remove sessions with `expires_at < now`, returning how many were removed.
    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}
