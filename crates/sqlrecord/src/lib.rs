//! # sqlrecord
//!
//! SQL data access in three layers: an incremental query builder, derived record mapping,
//! and an engine that runs both inside retrying transactions.
//!
//! ## Features
//!
//! - **Query builders**: `SELECT`/`UPDATE`/`DELETE` assembled clause by clause, with `?`
//!   placeholders, inline numeric literals and dialect-aware date and text matching
//! - **Record mapping**: `#[derive(Record)]` maps a struct to a table; handlers are built once
//!   per type and cached
//! - **Insert or update**: `store` decides by identity, writes generated identities back and
//!   re-reads database-stamped timestamps
//! - **Transactions**: explicit begin/commit/rollback, savepoints, and a retrying wrapper for
//!   serialization conflicts
//! - **Monitoring**: every statement is timed; slow ones are logged at `WARN` through `tracing`
//! - **Safe defaults**: `DELETE` requires `WHERE`, unsaved records cannot be updated
//! - **Test double**: the `mock` feature adds a scripted in-memory connection provider
//!
//! ## Example
//!
//! ```ignore
//! use sqlrecord::prelude::*;
//!
//! #[derive(Record, Debug, Default)]
//! #[record(table = "person")]
//! struct Person {
//!     id: Option<i64>,
//!     #[record(not_null)]
//!     name: String,
//!     age: i32,
//! }
//!
//! let db = Database::new(PgProvider::new(&url)?, DatabaseConfig::from_env()?);
//! let mut session = db.session();
//!
//! let mut ann = Person { name: "Ann".into(), age: 30, ..Default::default() };
//! session.store(&mut ann).await?;
//!
//! let mut q = db.select_for::<Person>()?;
//! q.where_equal("age", 30);
//! let people: Vec<Person> = session.query(&q).await?;
//!
//! session
//!     .transaction_with_retry(TransactionOptions::default(), async |s| {
//!         s.execute_sql("UPDATE person SET age=age+1 WHERE id=?", &[Value::Int(1)]).await
//!     })
//!     .await?;
//! ```

extern crate self as sqlrecord;

pub mod config;
pub mod connection;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod mapping;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod monitor;
pub mod postgres;
pub mod prelude;
pub mod query;
pub mod text;
pub mod transaction;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use config::DatabaseConfig;
pub use connection::{Connection, ConnectionProvider};
pub use dialect::Dialect;
pub use engine::{Database, Session};
pub use error::{OrmError, OrmResult};
pub use mapping::{
    ClassHandler, FieldHandler, FieldType, FieldValue, LocalizedString, Properties, Record,
    RecordDescriptor, ServerTime, SqlType, UNSAVED_ID,
};
pub use monitor::{
    CompositeMonitor, QueryContext, QueryMonitor, QueryResult, QueryStats, QueryType,
    StatsMonitor, TracingMonitor,
};
pub use postgres::{PgConnection, PgProvider};
pub use query::{
    BuildOptions, DeleteQuery, JoinType, ModifyQuery, Query, SearchMethod, SelectQuery,
    UpdateQuery,
};
pub use transaction::{IsolationLevel, TransactionOptions};
pub use value::{ConversionError, Row, Value};

#[cfg(feature = "pool")]
pub use pool::{PoolProvider, create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use sqlrecord_derive::{Record, RecordEnum};
