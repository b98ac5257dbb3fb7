//! JWT token generation and verification.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::de::DeserializeOwned;

use super::AuthError;
use super::config::AuthConfig;
use crate::models::auth::{AccessTokenClaims, RefreshTokenClaims, User};

/// `iss` claim stamped on every token.
pub const ISSUER: &str = "todo-api";

/// Algorithm used for signing.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Length of the random `jti` in refresh tokens.
const REFRESH_TOKEN_ID_LEN: usize = 32;

/// Mints and verifies access and refresh tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    /// Access token lifetime in whole seconds, reported to clients as `expires_in`.
    pub fn access_token_lifetime_secs(&self) -> i64 {
        i64::try_from(self.access_token_ttl.as_secs()).unwrap_or(i64::MAX)
    }

    /// Sign an access token for `user`, valid from now.
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue_access_token_at(user, Utc::now())
    }

    /// Sign an access token for `user` as if issued at `now`.
    pub fn issue_access_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = now + to_delta(self.access_token_ttl)?;
        let claims = AccessTokenClaims {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            is_admin: user.is_admin,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
            sub: user.id.to_string(),
        };
        self.sign(&claims)
    }

    /// Sign a refresh token. Returns the token and its absolute expiry.
    pub fn issue_refresh_token(&self) -> Result<(String, DateTime<Utc>), AuthError> {
        self.issue_refresh_token_at(Utc::now())
    }

    /// Sign a refresh token as if issued at `now`.
    pub fn issue_refresh_token_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let expires_at = now + to_delta(self.refresh_token_ttl)?;
        let claims = RefreshTokenClaims {
            jti: random_token_id(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };
        Ok((self.sign(&claims)?, expires_at))
    }

    /// Verify an access token, returning its claims.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.verify(token)
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// Passing this check does not make the token usable; the session store
    /// must still hold it.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, AuthError> {
        self.verify(token)
    }

    fn sign<T: serde::Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        decode::<T>(token, &self.decoding_key, &validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Only HMAC algorithms are accepted; anything else in the header is rejected.
fn validation() -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation
}

fn to_delta(ttl: Duration) -> Result<TimeDelta, AuthError> {
    TimeDelta::from_std(ttl).map_err(|e| AuthError::Internal(format!("token lifetime: {e}")))
}

fn random_token_id() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_ID_LEN)
        .map(char::from)
        .collect()
}
