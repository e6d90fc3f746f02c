//! Configuration for Learn Space
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secret used when running in development mode without JWT_SECRET
const DEV_JWT_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Minimum accepted length for JWT_SECRET
pub const MIN_SECRET_LEN: usize = 32;

/// 30 days, the session cookie and token lifetime
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// 400 days, the longest cookie lifetime browsers honor
pub const MAX_SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 400;

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Learn Space - course authoring and shareable presentations
#[derive(Parser, Debug, Clone)]
#[command(name = "learnspace")]
#[command(about = "Course authoring server with block documents and shareable presentations")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// SQLite database file (":memory:" for an ephemeral store)
    #[arg(long, env = "DATABASE_PATH", default_value = "learnspace.db")]
    pub database_path: PathBuf,

    /// JWT secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session lifetime in seconds (token expiry and cookie Max-Age)
    #[arg(long, env = "SESSION_MAX_AGE_SECS", default_value_t = DEFAULT_SESSION_MAX_AGE_SECS)]
    pub session_max_age_secs: u64,

    /// Mark the session cookie Secure (HTTPS only)
    #[arg(long, env = "COOKIE_SECURE", default_value = "false")]
    pub cookie_secure: bool,

    /// Optional Domain attribute for the session cookie
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,

    /// Enable development mode (built-in insecure JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Args {
    /// Get effective JWT secret (falls back to the dev secret in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some(DEV_JWT_SECRET.to_string()),
            (None, false) => None,
        }
    }

    /// Whether the database lives only in memory
    pub fn is_memory_database(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.jwt_secret {
            None if !self.dev_mode => {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(format!(
                    "JWT_SECRET must be at least {} characters",
                    MIN_SECRET_LEN
                ));
            }
            _ => {}
        }

        if self.session_max_age_secs == 0 {
            return Err("SESSION_MAX_AGE_SECS must be greater than zero".to_string());
        }

        if self.session_max_age_secs > MAX_SESSION_MAX_AGE_SECS {
            return Err(format!(
                "SESSION_MAX_AGE_SECS must be at most {}",
                MAX_SESSION_MAX_AGE_SECS
            ));
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}
