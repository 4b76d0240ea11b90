//! Transaction options and savepoint naming.
//!
//! Transactions themselves are driven through a [`Session`](crate::Session):
//!
//! ```ignore
//! use sqlrecord::{OrmResult, TransactionOptions};
//!
//! # async fn demo(db: &sqlrecord::Database<sqlrecord::PgProvider>) -> OrmResult<()> {
//! let mut session = db.session();
//! session
//!     .transaction_with_retry(TransactionOptions::default(), async |s| {
//!         let mut account = s.load::<Account>(7).await?;
//!         account.balance -= 100;
//!         s.update(&mut account).await
//!     })
//!     .await?;
//! # Ok(()) }
//! ```

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique savepoint name.
pub fn next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sqlrecord_sp_{n}")
}

/// Savepoint names are spliced into SQL, so only plain identifiers are accepted.
pub(crate) fn check_savepoint_name(name: &str) -> OrmResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(OrmError::validation(format!(
            "invalid savepoint name '{name}'"
        )))
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// How a transaction is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Statement(s) that open a transaction with these options.
    ///
    /// SQLite has no per-transaction isolation or access mode; it always gets a plain
    /// `BEGIN`.
    pub fn begin_sql(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => {
                let mut sql = format!("BEGIN ISOLATION LEVEL {}", self.isolation);
                if self.read_only {
                    sql.push_str(" READ ONLY");
                }
                sql
            }
            Dialect::MySql => {
                let access = if self.read_only { "READ ONLY" } else { "READ WRITE" };
                format!(
                    "SET TRANSACTION ISOLATION LEVEL {}, {access}; START TRANSACTION",
                    self.isolation
                )
            }
            Dialect::Sqlite => "BEGIN".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_statements_per_dialect() {
        let options = TransactionOptions::default();
        assert_eq!(
            options.begin_sql(Dialect::Postgres),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(
            options
                .with_isolation(IsolationLevel::ReadCommitted)
                .read_only(true)
                .begin_sql(Dialect::Postgres),
            "BEGIN ISOLATION LEVEL READ COMMITTED READ ONLY"
        );
        assert_eq!(
            options.begin_sql(Dialect::MySql),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE, READ WRITE; START TRANSACTION"
        );
        assert_eq!(options.read_only(true).begin_sql(Dialect::Sqlite), "BEGIN");
    }

    #[test]
    fn savepoint_names_are_unique_identifiers() {
        let a = next_savepoint_name();
        let b = next_savepoint_name();
        assert_ne!(a, b);
        assert!(check_savepoint_name(&a).is_ok());
        assert!(check_savepoint_name("before_import").is_ok());
        assert!(check_savepoint_name("1st").is_err());
        assert!(check_savepoint_name("x; DROP TABLE t").is_err());
        assert!(check_savepoint_name("").is_err());
    }
}
