//! API server configuration.

use std::time::Duration;

use thiserror::Error;
use todo_core::auth::config::{
    AuthConfig, DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_BCRYPT_COST, DEFAULT_JWT_SECRET,
    DEFAULT_REFRESH_TOKEN_TTL, parse_duration,
};
use tracing::warn;

/// Default interval between expired-session sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const PRODUCTION: &str = "production";

/// Configuration errors detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is not a valid duration: {value:?}")]
    InvalidDuration { var: &'static str, value: String },

    #[error("JWT_SECRET_KEY must be set to a non-default value in production")]
    DefaultSecretInProduction,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Deployment environment name (`development`, `production`, ...).
    pub environment: String,
    /// Address to bind the HTTP listener.
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Token and hashing settings handed to the auth service.
    pub auth: AuthConfig,
    /// How often expired refresh tokens are swept.
    pub sweep_interval: Duration,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                   | Default                 |
    /// |----------------------------|-------------------------|
    /// | `ENVIRONMENT`              | `development`           |
    /// | `BIND_ADDR`                | `0.0.0.0:8080`          |
    /// | `DATABASE_URL`             | required                |
    /// | `JWT_SECRET_KEY`           | development placeholder |
    /// | `JWT_ACCESS_TOKEN_EXPIRY`  | `15m`                   |
    /// | `JWT_REFRESH_TOKEN_EXPIRY` | `168h`                  |
    /// | `BCRYPT_COST`              | `10`                    |
    /// | `SESSION_SWEEP_INTERVAL`   | `1h`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let duration = |key: &'static str, default: Duration| match var(key) {
            None => Ok(default),
            Some(value) => parse_duration(&value)
                .filter(|d| !d.is_zero())
                .ok_or(ConfigError::InvalidDuration { var: key, value }),
        };

        let bcrypt_cost = match var("BCRYPT_COST") {
            None => DEFAULT_BCRYPT_COST,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "BCRYPT_COST is not a number, using default");
                DEFAULT_BCRYPT_COST
            }),
        };

        let config = Self {
            environment,
            bind_addr,
            database_url,
            auth: AuthConfig {
                jwt_secret: var("JWT_SECRET_KEY").unwrap_or_else(|| DEFAULT_JWT_SECRET.into()),
                access_token_ttl: duration("JWT_ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_TTL)?,
                refresh_token_ttl: duration("JWT_REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TOKEN_TTL)?,
                bcrypt_cost,
            },
            sweep_interval: duration("SESSION_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }

    /// Rejects settings that are unsafe for the configured environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.uses_default_secret() {
            if self.is_production() {
                return Err(ConfigError::DefaultSecretInProduction);
            }
            warn!("using the development JWT secret; set JWT_SECRET_KEY");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/todo")]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.auth.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.auth.refresh_token_ttl, Duration::from_secs(168 * 3600));
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert!(config.auth.uses_default_secret());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn durations_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("JWT_ACCESS_TOKEN_EXPIRY", "5m"),
            ("JWT_REFRESH_TOKEN_EXPIRY", "24h"),
            ("SESSION_SWEEP_INTERVAL", "1h30m"),
        ])
        .unwrap();
        assert_eq!(config.auth.access_token_ttl, Duration::from_secs(300));
        assert_eq!(config.auth.refresh_token_ttl, Duration::from_secs(86400));
        assert_eq!(config.sweep_interval, Duration::from_secs(5400));
    }

    #[test]
    fn bad_duration_is_an_error() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("JWT_ACCESS_TOKEN_EXPIRY", "fifteen"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { var: "JWT_ACCESS_TOKEN_EXPIRY", .. }
        ));
        assert!(load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("SESSION_SWEEP_INTERVAL", "0s"),
        ])
        .is_err());
    }

    #[test]
    fn unparseable_bcrypt_cost_falls_back() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("BCRYPT_COST", "high"),
        ])
        .unwrap();
        assert_eq!(config.auth.bcrypt_cost, DEFAULT_BCRYPT_COST);
    }

    #[test]
    fn production_rejects_placeholder_secret() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("ENVIRONMENT", "production"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DefaultSecretInProduction));

        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/todo"),
            ("ENVIRONMENT", "production"),
            ("JWT_SECRET_KEY", "a-real-secret"),
        ])
        .unwrap();
        assert!(config.is_production());
    }
}
