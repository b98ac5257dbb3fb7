//! Password hashing via bcrypt.

use super::AuthError;
use super::config::DEFAULT_BCRYPT_COST;

/// Smallest cost bcrypt accepts.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Largest cost bcrypt accepts.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashes and verifies passwords with a fixed bcrypt cost.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher; a cost outside bcrypt's valid range falls back to the default.
    pub fn new(cost: u32) -> Self {
        let cost = if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            cost
        } else {
            DEFAULT_BCRYPT_COST
        };
        Self { cost }
    }

    /// The effective cost factor.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::ValidationError(
                "password cannot be empty".into(),
            ));
        }
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt hash.
    ///
    /// Empty inputs and mismatches yield [`AuthError::InvalidCredentials`];
    /// a malformed hash is an internal error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), AuthError> {
        if password.is_empty() || hash.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        match bcrypt::verify(password, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(AuthError::Internal(format!("bcrypt verify: {e}"))),
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

/// Check a candidate password against the strength rules, reporting the first unmet one.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::ValidationError(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::ValidationError(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes long"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::ValidationError(
            "password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::ValidationError(
            "password must contain at least one lowercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::ValidationError(
            "password must contain at least one number".into(),
        ));
    }
    Ok(())
}
