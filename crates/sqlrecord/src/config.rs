//! Engine configuration.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query::BuildOptions;
use std::time::Duration;

/// Environment variable holding the slow-query threshold in (fractional) seconds.
pub const ENV_SLOW_QUERY_SECS: &str = "SQLRECORD_SLOW_QUERY_SECS";
/// Environment variable selecting the dialect (`postgres`, `mysql`, `sqlite`).
pub const ENV_DIALECT: &str = "SQLRECORD_DIALECT";
/// Environment variable toggling bound parameters (`true`/`false`).
pub const ENV_PARAMETERIZED: &str = "SQLRECORD_PARAMETERIZED";
/// Environment variable holding the clause separator.
pub const ENV_SEPARATOR: &str = "SQLRECORD_SEPARATOR";
/// Environment variable bounding `transaction_with_retry` attempts.
pub const ENV_MAX_TX_ATTEMPTS: &str = "SQLRECORD_MAX_TX_ATTEMPTS";

/// Configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Statements slower than this are logged at WARN instead of DEBUG.
    pub slow_query_threshold: Duration,
    /// Dialect used to render server-side expressions.
    pub dialect: Dialect,
    /// Bind non-literal values as `?` parameters instead of inlining quoted text.
    pub parameterized: bool,
    /// Inline booleans, numbers and enum names as literal SQL text.
    pub inline_literals: bool,
    /// Text placed between appended clauses.
    pub separator: String,
    /// Upper bound on attempts made by `transaction_with_retry`.
    pub max_transaction_attempts: u32,
    /// Shortest pause before retrying a conflicting transaction.
    pub retry_backoff_min: Duration,
    /// Longest pause before retrying a conflicting transaction.
    pub retry_backoff_max: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: Duration::from_secs(2),
            dialect: Dialect::Postgres,
            parameterized: true,
            inline_literals: true,
            separator: " ".to_string(),
            max_transaction_attempts: 100,
            retry_backoff_min: Duration::from_millis(10),
            retry_backoff_max: Duration::from_millis(100),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Unset variables keep their defaults; malformed ones are a validation error.
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_SLOW_QUERY_SECS) {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_SLOW_QUERY_SECS, &raw))?;
            config.slow_query_threshold =
                Duration::try_from_secs_f64(secs).map_err(|_| invalid(ENV_SLOW_QUERY_SECS, &raw))?;
        }
        if let Some(raw) = lookup(ENV_DIALECT) {
            config.dialect = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_PARAMETERIZED) {
            config.parameterized = parse_bool(&raw).ok_or_else(|| invalid(ENV_PARAMETERIZED, &raw))?;
        }
        if let Some(raw) = lookup(ENV_SEPARATOR) {
            config.separator = raw;
        }
        if let Some(raw) = lookup(ENV_MAX_TX_ATTEMPTS) {
            config.max_transaction_attempts = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid(ENV_MAX_TX_ATTEMPTS, &raw))?;
        }
        Ok(config)
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_parameterized(mut self, parameterized: bool) -> Self {
        self.parameterized = parameterized;
        self
    }

    pub fn with_inline_literals(mut self, inline: bool) -> Self {
        self.inline_literals = inline;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the attempt bound for `transaction_with_retry` (clamped to at least 1).
    pub fn with_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts.max(1);
        self
    }

    /// Set the random backoff window between retries.
    pub fn with_retry_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.retry_backoff_min = min.min(max);
        self.retry_backoff_max = max.max(min);
        self
    }

    /// Options inherited by queries created through a session.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            parameterized: self.parameterized,
            inline_literals: self.inline_literals,
            separator: self.separator.clone(),
            dialect: self.dialect,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &str, raw: &str) -> OrmError {
    OrmError::validation(format!("invalid value for {name}: '{raw}'"))
}
