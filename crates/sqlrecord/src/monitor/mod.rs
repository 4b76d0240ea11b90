//! Statement monitoring.
//!
//! Every statement the engine runs is timed and reported to the database's monitors:
//! a [`TracingMonitor`] built from the configured slow-query threshold is always present,
//! and further monitors (for example a shared [`StatsMonitor`]) can be added.
//!
//! ```rust,ignore
//! use sqlrecord::monitor::StatsMonitor;
//! use std::sync::Arc;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let db = Database::new(provider, DatabaseConfig::from_env()?).with_monitor_arc(stats.clone());
//! // ...
//! println!("{:?}", stats.stats());
//! ```

mod monitors;
mod tracing_monitor;
mod types;


pub use monitors::{CompositeMonitor, QueryStats, StatsMonitor};
pub use tracing_monitor::TracingMonitor;
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
