use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use std::time::Duration;
use tracing::Level;

/// Logs every statement through `tracing` (target `sqlrecord::sql`).
///
/// Statements slower than `slow_threshold` are emitted at WARN with the elapsed time,
/// result summary, SQL and parameters; everything else at `level` (DEBUG by default).
/// Every [`Database`](crate::Database) installs one built from its configuration.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Threshold above which statements are logged at WARN.
    pub slow_threshold: Duration,
    /// Level for statements below the threshold.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_secs(2),
            level: Level::DEBUG,
            max_sql_length: None,
        }
    }
}

impl TracingMonitor {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            ..Self::default()
        }
    }

    /// Override the level used for statements below the threshold.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub fn is_slow(&self, duration: Duration) -> bool {
        duration > self.slow_threshold
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let slow = self.is_slow(duration);
        let level = if slow { Level::WARN } else { self.level };
        let message = if slow { "slow statement" } else { "statement" };
        let sql = self.truncate_sql(&ctx.sql);
        let tag = ctx.tag.as_deref().unwrap_or("-");
        let elapsed_ms = duration.as_secs_f64() * 1000.0;

        emit_at_level!(
            level,
            target: "sqlrecord::sql",
            query_type = ?ctx.query_type,
            tag,
            elapsed_ms,
            result = %result,
            sql = %sql,
            params = %ctx.params_display(),
            "{message}"
        );
    }
}
