//! Environment-driven configuration.
//!
//! All settings come from `PEXBOT_*` variables. `Config::from_lookup` accepts any
//! key lookup so callers (and tests) can supply values without touching the
//! process environment.

use crate::error::{PexbotError, PexbotResult};
use crate::logging::LogFormat;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default pex.bot API base URL.
pub const DEFAULT_API_URL: &str = "https://pex.bot/api/v1";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "PEXBOT_API_URL";
pub const ENV_API_KEY: &str = "PEXBOT_API_KEY";
pub const ENV_TOKEN: &str = "PEXBOT_TOKEN";
pub const ENV_EMAIL: &str = "PEXBOT_EMAIL";
pub const ENV_PASSWORD: &str = "PEXBOT_PASSWORD";
pub const ENV_TIMEOUT: &str = "PEXBOT_HTTP_TIMEOUT_SECS";
pub const ENV_POW_MAX_ATTEMPTS: &str = "PEXBOT_POW_MAX_ATTEMPTS";
pub const ENV_LOG_FORMAT: &str = "PEXBOT_LOG_FORMAT";

/// Email + password pair used for automatic login.
#[derive(Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime configuration for the MCP server.
#[derive(Clone)]
pub struct Config {
    /// API base URL without a trailing slash.
    pub api_url: String,
    /// Static API key; takes precedence over every other credential.
    pub api_key: Option<Zeroizing<String>>,
    /// Static bearer session token.
    pub token: Option<Zeroizing<String>>,
    /// Credentials for lazy login when no key or token is configured.
    pub login: Option<LoginCredentials>,
    /// Variable missing when only half of the login pair was set.
    pub login_missing: Option<&'static str>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Cap on proof-of-work attempts; `None` searches until solved.
    pub pow_max_attempts: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            token: None,
            login: None,
            login_missing: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pow_max_attempts: None,
            log_format: LogFormat::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("login", &self.login)
            .field("login_missing", &self.login_missing)
            .field("timeout", &self.timeout)
            .field("pow_max_attempts", &self.pow_max_attempts)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> PexbotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset. The login pair is only used when both
    /// halves are present.
    pub fn from_lookup<F>(lookup: F) -> PexbotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        config.api_key = get(ENV_API_KEY).map(Zeroizing::new);
        config.token = get(ENV_TOKEN).map(Zeroizing::new);
        match (get(ENV_EMAIL), get(ENV_PASSWORD)) {
            (Some(email), Some(password)) => {
                config.login = Some(LoginCredentials::new(email, password));
            }
            (Some(_), None) => config.login_missing = Some(ENV_PASSWORD),
            (None, Some(_)) => config.login_missing = Some(ENV_EMAIL),
            (None, None) => {}
        }

        if let Some(raw) = get(ENV_TIMEOUT) {
            let secs: u64 = raw
                .parse()
                .map_err(|_| PexbotError::Config(format!("{ENV_TIMEOUT} must be an integer, got {raw:?}")))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get(ENV_POW_MAX_ATTEMPTS) {
            let attempts: u64 = raw.parse().map_err(|_| {
                PexbotError::Config(format!("{ENV_POW_MAX_ATTEMPTS} must be an integer, got {raw:?}"))
            })?;
            config.pow_max_attempts = Some(attempts);
        }
        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(PexbotError::Config)?;
        }

        Ok(config)
    }
}
