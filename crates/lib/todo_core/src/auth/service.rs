//! Auth orchestration: register, login, refresh, logout.
//!
//! A refresh token moves `issued → active → revoked | expired` and never
//! returns to `active`. "Active" means present in the [`SessionStore`] and
//! unexpired; the signed token alone is never enough.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::AuthError;
use super::config::AuthConfig;
use super::jwt::JwtManager;
use super::non_fatal::NonFatal;
use super::password::{PasswordHasher, validate_password_strength};
use super::store::{SessionStore, UserStore};
use crate::models::auth::{NewUser, PublicUser, TokenPair, User};

/// Value of `token_type` in token responses.
pub const TOKEN_TYPE: &str = "Bearer";

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;

/// Registration input, as received from the client.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Composes hashing, token issuance and the stores into the session lifecycle.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    jwt: JwtManager,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt: JwtManager::new(config),
            hasher: PasswordHasher::new(config.bcrypt_cost),
        }
    }

    /// Token issuer/verifier used by this service.
    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Create an account. Uniqueness is checked up front; nothing is written on failure.
    pub async fn register(&self, input: Registration) -> Result<PublicUser, AuthError> {
        let email = normalize(&input.email);
        let username = normalize(&input.username);
        let first_name = input.first_name.trim().to_string();
        let last_name = input.last_name.trim().to_string();

        validate_email(&email)?;
        validate_username(&username)?;
        validate_name("first name", &first_name)?;
        validate_name("last name", &last_name)?;
        validate_password_strength(&input.password)?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::EmailExists);
        }
        if self.users.username_exists(&username).await? {
            return Err(AuthError::UsernameExists);
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .create_user(&NewUser {
                email,
                username,
                password_hash,
                first_name,
                last_name,
                is_active: true,
                is_admin: false,
            })
            .await?;

        info!(user_id = user.id, "user registered");
        Ok(user.to_public())
    }

    /// Authenticate with a username or email plus password.
    ///
    /// The password is checked before the active flag, so an inactive
    /// account is only revealed to a caller holding its password.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let login = normalize(username_or_email);
        let user = if login.contains('@') {
            self.users.find_user_by_email(&login).await?
        } else {
            self.users.find_user_by_username(&login).await?
        };
        let user = user.ok_or(AuthError::InvalidCredentials)?;

        self.hasher.verify(password, &user.password_hash)?;

        if !user.is_active {
            return Err(AuthError::UserNotActive);
        }

        let pair = self.issue_session(&user).await?;

        NonFatal::from_result(
            "update last login",
            self.users.update_last_login(user.id, Utc::now()).await,
        )
        .ignore();

        info!(user_id = user.id, "user logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rotating the refresh token.
    ///
    /// The old row's deletion decides concurrent double use: if another call
    /// already removed it, this one fails. A delete that errors is logged and
    /// the rotation proceeds.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if let Err(e) = self.jwt.verify_refresh_token(refresh_token) {
            debug!(error = %e, "refresh token failed verification");
            return Err(AuthError::InvalidRefreshToken);
        }

        let record = self
            .sessions
            .find_valid_refresh_token(refresh_token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let user = match self.users.find_user_by_id(record.user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AuthError::InvalidRefreshToken),
        };

        let access_token = self.jwt.issue_access_token(&user)?;

        let removed = NonFatal::from_result(
            "delete rotated refresh token",
            self.sessions.delete_refresh_token(refresh_token).await,
        );
        if removed.ok() == Some(false) {
            warn!(user_id = user.id, "refresh token already consumed by a concurrent refresh");
            return Err(AuthError::InvalidRefreshToken);
        }

        let refresh_token = self.issue_refresh_token(user.id).await?;

        debug!(user_id = user.id, "refresh token rotated");
        Ok(self.token_pair(access_token, refresh_token))
    }

    /// Revoke one refresh token. Succeeds whether or not it existed.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.sessions.delete_refresh_token(refresh_token).await?;
        Ok(())
    }

    /// Revoke every refresh token of a user.
    pub async fn logout_all(&self, user_id: i64) -> Result<u64, AuthError> {
        let revoked = self.sessions.delete_user_refresh_tokens(user_id).await?;
        info!(user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Public projection of a user.
    pub async fn get_current_user(&self, user_id: i64) -> Result<PublicUser, AuthError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or(AuthError::UserNotFound)
    }

    /// Delete sessions whose expiry has passed. Meant for the periodic sweeper.
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, AuthError> {
        self.sessions.delete_expired_refresh_tokens(Utc::now()).await
    }

    async fn issue_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access_token = self.jwt.issue_access_token(user)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;
        Ok(self.token_pair(access_token, refresh_token))
    }

    async fn issue_refresh_token(&self, user_id: i64) -> Result<String, AuthError> {
        let (token, expires_at) = self.jwt.issue_refresh_token()?;
        self.sessions
            .save_refresh_token(user_id, &token, expires_at)
            .await?;
        Ok(token)
    }

    fn token_pair(&self, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.access_token_lifetime_secs(),
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::ValidationError("email is not valid".into()))
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::ValidationError(
            "username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<(), AuthError> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AuthError::ValidationError(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::auth::memory::MemoryStore;
    use crate::auth::password::MIN_BCRYPT_COST;

    fn setup() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig {
            jwt_secret: "service-test-secret".into(),
            bcrypt_cost: MIN_BCRYPT_COST,
            ..AuthConfig::default()
        };
        let service = AuthService::new(&config, store.clone(), store.clone());
        (service, store)
    }

    fn alice() -> Registration {
        Registration {
            email: "a@x.com".into(),
            username: "alice".into(),
            password: "Passw0rd".into(),
            first_name: " Alice ".into(),
            last_name: "Liddell".into(),
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_hides_hash() {
        let (auth, _) = setup();
        let user = auth
            .register(Registration {
                email: "  A@X.com ".into(),
                username: " Alice".into(),
                ..alice()
            })
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.username, "alice");
        assert_eq!(user.first_name, "Alice");
        assert!(user.is_active);
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_case_insensitively() {
        let (auth, store) = setup();
        auth.register(alice()).await.unwrap();

        let dup_email = auth
            .register(Registration {
                email: "A@X.COM".into(),
                username: "bob".into(),
                ..alice()
            })
            .await;
        assert!(matches!(dup_email, Err(AuthError::EmailExists)));

        let dup_username = auth
            .register(Registration {
                email: "b@x.com".into(),
                username: "ALICE".into(),
                ..alice()
            })
            .await;
        assert!(matches!(dup_username, Err(AuthError::UsernameExists)));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn register_validates_before_writing() {
        let (auth, store) = setup();
        let weak = auth
            .register(Registration {
                password: "password1".into(),
                ..alice()
            })
            .await;
        assert!(matches!(weak, Err(AuthError::ValidationError(m)) if m.contains("uppercase")));

        let bad_email = auth
            .register(Registration {
                email: "not-an-email".into(),
                ..alice()
            })
            .await;
        assert!(matches!(bad_email, Err(AuthError::ValidationError(_))));

        let short_name = auth
            .register(Registration {
                username: "al".into(),
                ..alice()
            })
            .await;
        assert!(matches!(short_name, Err(AuthError::ValidationError(_))));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn login_by_username_or_email() {
        let (auth, _) = setup();
        auth.register(alice()).await.unwrap();

        let pair = auth.login("ALICE", "Passw0rd").await.unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        let claims = auth.jwt().verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.username, "alice");

        assert!(auth.login(" a@x.com ", "Passw0rd").await.is_ok());
    }

    #[tokio::test]
    async fn login_stamps_last_login() {
        let (auth, _) = setup();
        let user = auth.register(alice()).await.unwrap();
        assert!(user.last_login_at.is_none());
        auth.login("alice", "Passw0rd").await.unwrap();
        let user = auth.get_current_user(user.id).await.unwrap();
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn login_failures_do_not_reveal_which_check_failed() {
        let (auth, _) = setup();
        auth.register(alice()).await.unwrap();
        assert!(matches!(
            auth.login("alice", "Wr0ngPass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "Passw0rd").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("alice", "").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_user_checked_after_password() {
        let (auth, store) = setup();
        let user = auth.register(alice()).await.unwrap();
        store.set_active(user.id, false);

        assert!(matches!(
            auth.login("alice", "Wr0ngPass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("alice", "Passw0rd").await,
            Err(AuthError::UserNotActive)
        ));
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn refresh_rotates_the_token() {
        let (auth, store) = setup();
        auth.register(alice()).await.unwrap();
        let first = auth.login("alice", "Passw0rd").await.unwrap();

        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(store.session_count(), 1);

        assert!(matches!(
            auth.refresh(&first.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(auth.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_requires_a_stored_unexpired_row() {
        let (auth, store) = setup();
        let user = auth.register(alice()).await.unwrap();

        // Signed correctly but never stored.
        let (unknown, _) = auth.jwt().issue_refresh_token().unwrap();
        assert!(matches!(
            auth.refresh(&unknown).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        // Signed correctly, stored, but the row has expired.
        let (stale, _) = auth.jwt().issue_refresh_token().unwrap();
        store
            .save_refresh_token(user.id, &stale, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(matches!(
            auth.refresh(&stale).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        // Stored but not a valid signature.
        store
            .save_refresh_token(user.id, "forged", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(matches!(
            auth.refresh("forged").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_inactive_or_missing_user() {
        let (auth, store) = setup();
        let user = auth.register(alice()).await.unwrap();

        let pair = auth.login("alice", "Passw0rd").await.unwrap();
        store.set_active(user.id, false);
        assert!(matches!(
            auth.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        store.set_active(user.id, true);
        let pair = auth.login("alice", "Passw0rd").await.unwrap();
        store.remove_user(user.id);
        assert!(matches!(
            auth.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn concurrent_refresh_succeeds_once() {
        let (auth, _) = setup();
        auth.register(alice()).await.unwrap();
        let pair = auth.login("alice", "Passw0rd").await.unwrap();

        let (a, b) = tokio::join!(
            auth.refresh(&pair.refresh_token),
            auth.refresh(&pair.refresh_token)
        );
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn logout_revokes_single_token() {
        let (auth, _) = setup();
        auth.register(alice()).await.unwrap();
        let kept = auth.login("alice", "Passw0rd").await.unwrap();
        let dropped = auth.login("alice", "Passw0rd").await.unwrap();

        auth.logout(&dropped.refresh_token).await.unwrap();
        auth.logout(&dropped.refresh_token).await.unwrap();
        auth.logout("never-issued").await.unwrap();

        assert!(matches!(
            auth.refresh(&dropped.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(auth.refresh(&kept.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn logout_all_revokes_every_token_of_the_user() {
        let (auth, _) = setup();
        let user = auth.register(alice()).await.unwrap();
        auth.register(Registration {
            email: "b@x.com".into(),
            username: "bob".into(),
            ..alice()
        })
        .await
        .unwrap();

        let a1 = auth.login("alice", "Passw0rd").await.unwrap();
        let a2 = auth.login("alice", "Passw0rd").await.unwrap();
        let b1 = auth.login("bob", "Passw0rd").await.unwrap();

        assert_eq!(auth.logout_all(user.id).await.unwrap(), 2);
        for pair in [&a1, &a2] {
            assert!(matches!(
                auth.refresh(&pair.refresh_token).await,
                Err(AuthError::InvalidRefreshToken)
            ));
        }
        assert!(auth.refresh(&b1.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn get_current_user_requires_record() {
        let (auth, _) = setup();
        assert!(matches!(
            auth.get_current_user(99).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_rows() {
        let (auth, store) = setup();
        let now = Utc::now();
        store
            .save_refresh_token(1, "old", now - Duration::hours(1))
            .await
            .unwrap();
        store
            .save_refresh_token(1, "new", now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(auth.cleanup_expired_tokens().await.unwrap(), 1);
        assert_eq!(store.session_count(), 1);
    }
}
