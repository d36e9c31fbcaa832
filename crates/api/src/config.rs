//! Process configuration loaded from the environment.
//!
//! `.env` is read first when present; real environment variables win.
//! Every value except the JWT secret has a usable default.

use std::env;

use thiserror::Error;

use storefront_auth::PasswordPolicy;
use storefront_observability::LogFormat;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub app_host: String,
    pub app_port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub password_policy: PasswordPolicy,
    pub log_format: LogFormat,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("app_host", &self.app_host)
            .field("app_port", &self.app_port)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("database_max_connections", &self.database_max_connections)
            .field("password_policy", &self.password_policy)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Load `.env` (if any), then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let access_token_ttl_secs: i64 = parsed(&get, "ACCESS_TOKEN_TTL_SECS", 300)?;
        let refresh_token_ttl_secs: i64 = parsed(&get, "REFRESH_TOKEN_TTL_SECS", 86_400)?;
        for (key, value) in [
            ("ACCESS_TOKEN_TTL_SECS", access_token_ttl_secs),
            ("REFRESH_TOKEN_TTL_SECS", refresh_token_ttl_secs),
        ] {
            if value <= 0 {
                return Err(invalid(key, "must be a positive number of seconds"));
            }
        }

        let defaults = PasswordPolicy::default();
        let password_policy = PasswordPolicy {
            min_length: parsed(&get, "PASSWORD_MIN_LENGTH", defaults.min_length)?,
            reject_numeric: parsed(&get, "PASSWORD_REJECT_NUMERIC", defaults.reject_numeric)?,
            reject_common: parsed(&get, "PASSWORD_REJECT_COMMON", defaults.reject_common)?,
            reject_similar_to_user: parsed(
                &get,
                "PASSWORD_REJECT_SIMILAR",
                defaults.reject_similar_to_user,
            )?,
        };

        let database_max_connections: u32 = parsed(&get, "DATABASE_MAX_CONNECTIONS", 5)?;
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
        }

        Ok(Self {
            app_host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            app_port: parsed(&get, "APP_PORT", 8080)?,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            password_policy,
            log_format: parsed(&get, "LOG_FORMAT", LogFormat::Json)?,
        })
    }

    /// Deterministic configuration for tests: in-memory store, fixed secret.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            app_host: "127.0.0.1".to_string(),
            app_port: 0,
            jwt_secret: jwt_secret.to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 86_400,
            database_url: None,
            database_max_connections: 1,
            password_policy: PasswordPolicy::default(),
            log_format: LogFormat::Json,
        }
    }

    /// True when `JWT_SECRET` was unset and the insecure default is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
