//! Auth-related database queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::store::{SessionStore, UserStore};
use crate::models::auth::{NewUser, RefreshTokenRecord, User};

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     is_active, is_admin, last_login_at, created_at, updated_at";

/// Insert a user, returning the stored row.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User, AuthError> {
    let sql = format!(
        "INSERT INTO users (email, username, password_hash, first_name, last_name, is_active, is_admin) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.is_admin)
        .fetch_one(pool)
        .await
        .map_err(AuthError::db("create user"))
}

/// Fetch a user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, AuthError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AuthError::db("find user by id"))
}

/// Fetch a user by (normalized) email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AuthError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AuthError::db("find user by email"))
}

/// Fetch a user by (normalized) username.
pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, AuthError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(AuthError::db("find user by username"))
}

/// Check whether an email is already registered.
pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, AuthError> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(AuthError::db("check email existence"))
}

/// Check whether a username is already taken.
pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, AuthError> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
        .map_err(AuthError::db("check username existence"))
}

/// Stamp a user's last login time.
pub async fn update_last_login(
    pool: &PgPool,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<(), AuthError> {
    sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
        .bind(at)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AuthError::db("update last login"))?;
    Ok(())
}

/// Store a refresh token.
pub async fn save_refresh_token(
    pool: &PgPool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AuthError> {
    sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await
        .map_err(AuthError::db("save refresh token"))?;
    Ok(())
}

/// Find a refresh token that has not expired as of `now`.
pub async fn find_valid_refresh_token(
    pool: &PgPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<RefreshTokenRecord>, AuthError> {
    sqlx::query_as::<_, RefreshTokenRecord>(
        "SELECT id, user_id, token, expires_at, created_at \
         FROM refresh_tokens \
         WHERE token = $1 AND expires_at > $2",
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(AuthError::db("find refresh token"))
}

/// Delete a refresh token. Returns whether a row was removed.
pub async fn delete_refresh_token(pool: &PgPool, token: &str) -> Result<bool, AuthError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await
        .map_err(AuthError::db("delete refresh token"))?;
    Ok(result.rows_affected() > 0)
}

/// Delete all refresh tokens for a user.
pub async fn delete_user_refresh_tokens(pool: &PgPool, user_id: i64) -> Result<u64, AuthError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AuthError::db("delete user refresh tokens"))?;
    Ok(result.rows_affected())
}

/// Delete refresh tokens that expired strictly before `now`.
pub async fn delete_expired_refresh_tokens(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<u64, AuthError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await
        .map_err(AuthError::db("delete expired refresh tokens"))?;
    Ok(result.rows_affected())
}

/// PostgreSQL-backed [`UserStore`] and [`SessionStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, AuthError> {
        create_user(&self.pool, user).await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        find_user_by_id(&self.pool, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        find_user_by_email(&self.pool, email).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        find_user_by_username(&self.pool, username).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        email_exists(&self.pool, email).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        username_exists(&self.pool, username).await
    }

    async fn update_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError> {
        update_last_login(&self.pool, user_id, at).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn save_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        save_refresh_token(&self.pool, user_id, token, expires_at).await
    }

    async fn find_valid_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        find_valid_refresh_token(&self.pool, token, now).await
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AuthError> {
        delete_refresh_token(&self.pool, token).await
    }

    async fn delete_user_refresh_tokens(&self, user_id: i64) -> Result<u64, AuthError> {
        delete_user_refresh_tokens(&self.pool, user_id).await
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        delete_expired_refresh_tokens(&self.pool, now).await
    }
}
