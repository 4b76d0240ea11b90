//! SQL dialects.

use crate::error::OrmError;
use std::fmt;
use std::str::FromStr;

/// The SQL dialect spoken by the database.
///
/// Dialects differ only in the current-timestamp expression and in the statement that
/// returns the identity generated by the last `INSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// SQL expression evaluating to the server's current timestamp.
    pub const fn current_timestamp(self) -> &'static str {
        match self {
            Dialect::Postgres => "now()",
            Dialect::MySql => "NOW()",
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
        }
    }

    /// Statement returning the identity generated by the last insert on this connection.
    pub const fn last_insert_id(self) -> &'static str {
        match self {
            Dialect::Postgres => "SELECT lastval()",
            Dialect::MySql => "SELECT LAST_INSERT_ID()",
            Dialect::Sqlite => "SELECT last_insert_rowid()",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(OrmError::validation(format!("unknown SQL dialect '{other}'"))),
        }
    }
}
