//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET`: HMAC secret for session tokens. Must be changed (and be at
//!   least 32 characters) when `ENV=production`.
//! - `JWT_EXPIRY_HOURS`: Session token lifetime (default: 24)
//! - `LOGIN_RATE_LIMIT` / `LOGIN_RATE_WINDOW_SECS`: Login admission (default: 5 per 900s)
//! - `TRUSTED_PROXIES`: CIDR ranges whose forwarding headers are honored
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated list of allowed origins
//!
//! # Seeded Administrator
//!
//! `ADMIN_EMAIL`, `ADMIN_NAME` and `ADMIN_PASSWORD` describe the account created
//! at startup. It is always flagged as requiring a password change.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Placeholder secret shipped for local development.
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Minimum secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Longest session token lifetime accepted (one year).
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment '{other}', expected 'development' or 'production'"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    /// Deployment environment (default: development)
    pub environment: Environment,

    /// Overall deadline for a single request (default: 30 seconds)
    pub request_timeout: Duration,

    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Session Tokens
    // =========================================================================
    /// HMAC secret for signing session tokens
    pub jwt_secret: String,

    /// Session token lifetime (default: 24 hours)
    pub jwt_expiry: Duration,

    // =========================================================================
    // Login Admission
    // =========================================================================
    /// Admitted login attempts per client per window (default: 5)
    pub login_rate_limit: u32,

    /// Admission window length (default: 15 minutes)
    pub login_rate_window: Duration,

    /// How often expired admission records are swept (default: 5 minutes)
    pub admission_sweep_interval: Duration,

    // =========================================================================
    // Password Hashing
    // =========================================================================
    /// Argon2 memory cost in KiB (default: 19456)
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 2)
    pub argon2_iterations: u32,

    // =========================================================================
    // Seeded Administrator
    // =========================================================================
    pub admin_email: String,
    pub admin_name: String,
    pub admin_password: String,

    // =========================================================================
    // Network Security
    // =========================================================================
    /// Allowed CORS origins; "*" allows any
    pub cors_allowed_origins: Vec<String>,

    /// Trusted proxy CIDR ranges.
    ///
    /// When non-empty, `X-Real-IP` / `X-Forwarded-For` are only honored if the
    /// connection originates from one of these networks; otherwise the peer
    /// address is used as the client key.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level filter used when `RUST_LOG` is unset (default: "info")
    pub log_level: String,

    /// Log output format (default: pretty)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("request_timeout", &self.request_timeout)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry", &self.jwt_expiry)
            .field("login_rate_limit", &self.login_rate_limit)
            .field("login_rate_window", &self.login_rate_window)
            .field("admission_sweep_interval", &self.admission_sweep_interval)
            .field("argon2_memory_kib", &self.argon2_memory_kib)
            .field("argon2_iterations", &self.argon2_iterations)
            .field("admin_email", &self.admin_email)
            .field("admin_name", &self.admin_name)
            .field("admin_password", &"<redacted>")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any value fails to parse or the
    /// resulting configuration is invalid for the selected environment.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,
            environment: Self::parse_env("ENV", defaults.environment)?,
            request_timeout: Duration::from_secs(Self::parse_env("REQUEST_TIMEOUT_SECS", 30)?),
            max_request_body_size: Self::parse_env(
                "MAX_REQUEST_BODY_SIZE",
                defaults.max_request_body_size,
            )?,

            // Session tokens
            jwt_secret: env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.jwt_secret),
            jwt_expiry: Duration::from_secs(
                Self::parse_env::<u64>("JWT_EXPIRY_HOURS", 24)?.saturating_mul(3600),
            ),

            // Login admission
            login_rate_limit: Self::parse_env("LOGIN_RATE_LIMIT", defaults.login_rate_limit)?,
            login_rate_window: Duration::from_secs(Self::parse_env(
                "LOGIN_RATE_WINDOW_SECS",
                900,
            )?),
            admission_sweep_interval: Duration::from_secs(Self::parse_env(
                "ADMISSION_SWEEP_INTERVAL_SECS",
                300,
            )?),

            // Password hashing
            argon2_memory_kib: Self::parse_env("ARGON2_MEMORY_KIB", defaults.argon2_memory_kib)?,
            argon2_iterations: Self::parse_env("ARGON2_ITERATIONS", defaults.argon2_iterations)?,

            // Seeded administrator
            admin_email: env::var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_name: env::var("ADMIN_NAME").unwrap_or(defaults.admin_name),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),

            // Network security
            cors_allowed_origins: Self::parse_list("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
            trusted_proxies: Self::parse_list("TRUSTED_PROXIES").unwrap_or_default(),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: Self::parse_env("LOG_FORMAT", defaults.log_format)?,
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.is_production() {
            if self.jwt_secret == DEFAULT_JWT_SECRET {
                return Err(AppError::ConfigError(
                    "JWT_SECRET must be changed from its default in production".to_string(),
                ));
            }
            if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                return Err(AppError::ConfigError(format!(
                    "JWT_SECRET must be at least {MIN_PRODUCTION_SECRET_LEN} characters in production"
                )));
            }
        }

        if self.jwt_secret.is_empty() {
            return Err(AppError::ConfigError(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }

        if self.jwt_expiry.is_zero() {
            return Err(AppError::ConfigError(
                "JWT_EXPIRY_HOURS must be greater than 0".to_string(),
            ));
        }

        if self.jwt_expiry > Duration::from_secs(MAX_JWT_EXPIRY_HOURS * 3600) {
            return Err(AppError::ConfigError(format!(
                "JWT_EXPIRY_HOURS must not exceed {MAX_JWT_EXPIRY_HOURS}"
            )));
        }

        if self.login_rate_limit == 0 {
            return Err(AppError::ConfigError(
                "LOGIN_RATE_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.login_rate_window.is_zero() {
            return Err(AppError::ConfigError(
                "LOGIN_RATE_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        if self.admission_sweep_interval.is_zero() {
            return Err(AppError::ConfigError(
                "ADMISSION_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.admin_password.len() < crate::validation::MIN_PASSWORD_LENGTH {
            return Err(AppError::ConfigError(format!(
                "ADMIN_PASSWORD must be at least {} characters",
                crate::validation::MIN_PASSWORD_LENGTH
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list. `None` when the variable is unset or blank.
    fn parse_list(name: &str) -> Option<Vec<String>> {
        env::var(name)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| split_list(&s))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            request_timeout: Duration::from_secs(30),
            max_request_body_size: 1024 * 1024, // 1MB
            // Session tokens
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiry: Duration::from_secs(24 * 3600),
            // Login admission
            login_rate_limit: 5,
            login_rate_window: Duration::from_secs(15 * 60),
            admission_sweep_interval: Duration::from_secs(5 * 60),
            // Password hashing
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            // Seeded administrator
            admin_email: "admin@example.com".to_string(),
            admin_name: "Administrator".to_string(),
            admin_password: "change-me-now".to_string(),
            // Network security
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            trusted_proxies: vec![],
            // Observability
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: 0,
        }
    }
}
