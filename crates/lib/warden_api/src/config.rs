//! API server configuration.

use std::fmt;

use chrono::Duration;
use thiserror::Error;
use warden_core::auth::jwt::{generate_secret, resolve_session_secret};
use warden_core::auth::scope::{DEFAULT_GUARDED_PATHS, DEFAULT_SELF_SCOPE_ROLES};
use warden_core::auth::session::DEFAULT_SESSION_TTL_SECS;
use warden_core::csrf::service::{DEFAULT_CSRF_TTL_SECS, DEFAULT_RENEW_THRESHOLD_SECS};
use warden_core::permissions::pattern::{normalize_path, path_segments};

/// Path whose mutating requests may proceed without a CSRF cookie.
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Upper bound for session and CSRF lifetimes (30 days).
pub const MAX_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// An entry of the public-endpoint allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicEndpoint {
    /// Exactly this path.
    Exact(String),
    /// This path and everything below it.
    Prefix(String),
}

impl PublicEndpoint {
    pub fn exact(path: &str) -> Self {
        PublicEndpoint::Exact(normalize_path(path))
    }

    pub fn prefix(path: &str) -> Self {
        PublicEndpoint::Prefix(normalize_path(path))
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self {
            PublicEndpoint::Exact(p) => path == *p,
            PublicEndpoint::Prefix(p) => {
                path == *p || (p == "/") || path.starts_with(&format!("{p}/"))
            }
        }
    }
}

/// Login, token verification, option lists, health and password reset.
pub fn default_public_endpoints() -> Vec<PublicEndpoint> {
    vec![
        PublicEndpoint::exact("/api/auth/login"),
        PublicEndpoint::prefix("/api/verification"),
        PublicEndpoint::prefix("/api/person-sex"),
        PublicEndpoint::prefix("/actuator"),
        PublicEndpoint::prefix("/api/auth/reset-password"),
    ]
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HS256 key for session tokens.
    pub session_secret: Vec<u8>,
    pub session_ttl: Duration,
    pub csrf_ttl: Duration,
    /// Remaining CSRF lifetime at or below which the token is rotated.
    pub csrf_renew_threshold: Duration,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    /// Origins allowed to make credentialed cross-site calls.
    pub cors_allowed_origins: Vec<String>,
    /// Roles restricted to their own resources on guarded paths.
    pub self_scope_roles: Vec<String>,
    pub self_scope_paths: Vec<String>,
    /// Roles allowed to trigger a permission-rule rebuild.
    pub rule_admin_roles: Vec<String>,
    pub public_endpoints: Vec<PublicEndpoint>,
    pub logout_path: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("csrf_ttl", &self.csrf_ttl)
            .field("csrf_renew_threshold", &self.csrf_renew_threshold)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_secure", &self.cookie_secure)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("self_scope_roles", &self.self_scope_roles)
            .field("self_scope_paths", &self.self_scope_paths)
            .field("rule_admin_roles", &self.rule_admin_roles)
            .field("public_endpoints", &self.public_endpoints)
            .field("logout_path", &self.logout_path)
            .finish_non_exhaustive()
    }
}

impl Default for ApiConfig {
    /// Development defaults with a random per-process session secret.
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            database_url: "postgres://localhost:5432/warden".into(),
            session_secret: generate_secret(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            csrf_ttl: Duration::seconds(DEFAULT_CSRF_TTL_SECS),
            csrf_renew_threshold: Duration::seconds(DEFAULT_RENEW_THRESHOLD_SECS),
            cookie_domain: None,
            cookie_secure: true,
            cors_allowed_origins: Vec::new(),
            self_scope_roles: to_strings(&DEFAULT_SELF_SCOPE_ROLES),
            self_scope_paths: to_strings(&DEFAULT_GUARDED_PATHS),
            rule_admin_roles: to_strings(&["SYSTEM_ADMIN", "SECURITY_ADMIN"]),
            public_endpoints: default_public_endpoints(),
            logout_path: LOGOUT_PATH.into(),
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                    | Default                              |
    /// |-----------------------------|--------------------------------------|
    /// | `BIND_ADDR`                 | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`              | `postgres://localhost:5432/warden`   |
    /// | `SESSION_SECRET`            | random per process (base64, ≥32 B)   |
    /// | `SESSION_TTL_SECS`          | `7200`                               |
    /// | `CSRF_TTL_SECS`             | `7200`                               |
    /// | `CSRF_RENEW_THRESHOLD_SECS` | `600`                                |
    /// | `COOKIE_DOMAIN`             | unset                                |
    /// | `COOKIE_SECURE`             | `true`                               |
    /// | `CORS_ALLOWED_ORIGINS`      | empty (comma separated)              |
    /// | `SELF_SCOPE_ROLES`          | `USER,NEW_USER`                      |
    /// | `RULE_ADMIN_ROLES`          | `SYSTEM_ADMIN,SECURITY_ADMIN`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let session_secret =
            resolve_session_secret().map_err(|e| ConfigError::InvalidValue {
                key: "SESSION_SECRET",
                message: e.to_string(),
            })?;

        let config = Self {
            bind_addr: env_opt("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: env_opt("DATABASE_URL").unwrap_or(defaults.database_url),
            session_secret,
            session_ttl: env_secs("SESSION_TTL_SECS", defaults.session_ttl)?,
            csrf_ttl: env_secs("CSRF_TTL_SECS", defaults.csrf_ttl)?,
            csrf_renew_threshold: env_secs(
                "CSRF_RENEW_THRESHOLD_SECS",
                defaults.csrf_renew_threshold,
            )?,
            cookie_domain: env_opt("COOKIE_DOMAIN"),
            cookie_secure: env_bool("COOKIE_SECURE", defaults.cookie_secure)?,
            cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
            self_scope_roles: env_list("SELF_SCOPE_ROLES").unwrap_or(defaults.self_scope_roles),
            self_scope_paths: defaults.self_scope_paths,
            rule_admin_roles: env_list("RULE_ADMIN_ROLES").unwrap_or(defaults.rule_admin_roles),
            public_endpoints: defaults.public_endpoints,
            logout_path: defaults.logout_path,
        };
        config.check()?;
        Ok(config)
    }

    /// Cross-field checks.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.session_ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_TTL_SECS",
                message: "must be positive".into(),
            });
        }
        if self.csrf_ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_TTL_SECS",
                message: "must be positive".into(),
            });
        }
        let max_ttl = Duration::seconds(MAX_TTL_SECS);
        if self.session_ttl > max_ttl {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_TTL_SECS",
                message: format!("must not exceed {MAX_TTL_SECS}"),
            });
        }
        if self.csrf_ttl > max_ttl {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_TTL_SECS",
                message: format!("must not exceed {MAX_TTL_SECS}"),
            });
        }
        if self.csrf_renew_threshold < Duration::zero()
            || self.csrf_renew_threshold >= self.csrf_ttl
        {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_RENEW_THRESHOLD_SECS",
                message: "must be non-negative and below CSRF_TTL_SECS".into(),
            });
        }
        Ok(())
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_endpoints.iter().any(|e| e.matches(path))
    }

    pub fn is_logout(&self, path: &str) -> bool {
        path_segments(path).eq(path_segments(&self.logout_path))
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_opt(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn env_secs(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env_opt(key) {
        Some(raw) => parse_secs(key, &raw),
        None => Ok(default),
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
        key,
        message: e.to_string(),
    })?;
    Duration::try_seconds(secs).ok_or_else(|| ConfigError::InvalidValue {
        key,
        message: format!("{secs} seconds is out of range"),
    })
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env_opt(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            key,
            message: format!("'{v}' is not a boolean"),
        }),
    }
}
