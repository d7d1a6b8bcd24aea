//! Connection configuration
//!
//! Connection parameters come from five environment values (`DB_HOST`,
//! `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`) plus an optional
//! `DB_SSLMODE`. Missing values are not an error here: they leave the config
//! incomplete, and [`ConnectionConfig::validate`] reports them when a
//! connection is attempted.

use crate::error::{ConfigError, ConfigResult};
use std::fmt;
use tracing::warn;

pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_NAME: &str = "DB_NAME";
pub const ENV_USER: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_SSLMODE: &str = "DB_SSLMODE";

/// Database connection configuration
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: SslMode,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &password)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// SSL connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

fn default_port() -> u16 {
    5432
}

impl SslMode {
    fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }

    fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" | "" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(ConfigError::Invalid(format!(
                "{} must be disable, prefer or require (got '{}')",
                ENV_SSLMODE, other
            ))),
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
            ssl_mode: SslMode::default(),
        }
    }

    /// Read the connection settings from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the connection settings through `lookup`, which maps an
    /// environment variable name to its value.
    ///
    /// Absent values become empty fields (with a warning); an absent port
    /// falls back to 5432. A port that is present but not a number is a
    /// configuration error.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                warn!("{} is not set", key);
                String::new()
            }
        };

        let port = match lookup(ENV_PORT) {
            Some(p) if !p.trim().is_empty() => p.trim().parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a port number (got '{}')", ENV_PORT, p))
            })?,
            _ => default_port(),
        };

        let ssl_mode = match lookup(ENV_SSLMODE) {
            Some(v) => SslMode::parse(&v)?,
            None => SslMode::default(),
        };

        Ok(Self {
            host: read(ENV_HOST),
            port,
            database: read(ENV_NAME),
            username: read(ENV_USER),
            // Passwords may legitimately contain leading/trailing spaces
            password: lookup(ENV_PASSWORD).unwrap_or_else(|| {
                warn!("{} is not set", ENV_PASSWORD);
                String::new()
            }),
            ssl_mode,
        })
    }

    /// Names of the required settings that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.port == 0 {
            missing.push("port");
        }
        if self.database.trim().is_empty() {
            missing.push("database");
        }
        if self.username.trim().is_empty() {
            missing.push("user");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }

    /// Check that every required setting is present.
    pub fn validate(&self) -> ConfigResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "missing connection settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Short label for status lines and logs, e.g. `mydb@localhost:5432`
    pub fn display_name(&self) -> String {
        format!("{}@{}:{}", self.database, self.host, self.port)
    }

    /// Build a PostgreSQL connection string (without password)
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} sslmode={}",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.database),
            quote_conn_value(&self.username),
            self.ssl_mode.as_str()
        )
    }

    /// Build a full connection string including password
    pub fn connection_string_with_password(&self) -> String {
        format!(
            "{} password={}",
            self.connection_string(),
            quote_conn_value(&self.password)
        )
    }
}

/// Quote a key/value connection-string value when it contains spaces,
/// quotes or backslashes (libpq rules).
fn quote_conn_value(value: &str) -> String {
    if !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\')
    {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
