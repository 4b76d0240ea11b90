//! Execution engine: turns built queries and records into statements, runs them through a
//! [`ConnectionProvider`], and manages transactions.
//!
//! A [`Database`] is shared (typically in an `Arc`); each unit of work opens a [`Session`],
//! which owns the transaction state. Outside a transaction every operation acquires its own
//! connection and releases it before returning; inside one, the transaction's connection is
//! reused.
//!
//! ```ignore
//! let db = Database::new(provider, DatabaseConfig::from_env()?);
//! let mut session = db.session();
//!
//! let mut person = Person { id: None, name: "Ann".into(), ..Default::default() };
//! session.store(&mut person).await?; // INSERT, identity written back
//! person.name = "Anna".into();
//! session.store(&mut person).await?; // UPDATE by identity
//!
//! let mut q = db.select_for::<Person>()?;
//! q.where_equal("name", "Anna");
//! let found: Vec<Person> = session.query(&q).await?;
//! ```

mod persist;
mod session;


pub use session::Session;

use crate::config::DatabaseConfig;
use crate::connection::{Connection, ConnectionProvider};
use crate::error::OrmResult;
use crate::mapping::Record;
use crate::monitor::{CompositeMonitor, QueryContext, QueryMonitor, QueryResult, TracingMonitor};
use crate::query::{DeleteQuery, SelectQuery, UpdateQuery};
use crate::value::{Row, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Shared entry point: connection provider, configuration and monitors.
pub struct Database<P: ConnectionProvider> {
    provider: P,
    config: DatabaseConfig,
    monitor: CompositeMonitor,
}

impl<P: ConnectionProvider> std::fmt::Debug for Database<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl<P: ConnectionProvider> Database<P> {
    pub fn new(provider: P, config: DatabaseConfig) -> Self {
        let monitor =
            CompositeMonitor::new().add(TracingMonitor::new(config.slow_query_threshold));
        Self {
            provider,
            config,
            monitor,
        }
    }

    /// Add a monitor that observes every statement.
    pub fn with_monitor<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.with_monitor_arc(Arc::new(monitor))
    }

    /// Add an Arc-wrapped monitor (keep a clone to read it later).
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor.push(monitor);
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Open a unit of work.
    pub fn session(&self) -> Session<'_, P> {
        Session::new(self)
    }

    /// A `SELECT` builder configured like this database.
    pub fn select_query(&self, table: &str) -> SelectQuery {
        SelectQuery::with_options(table, self.config.build_options())
    }

    /// A `SELECT` builder over the table mapped by `R`.
    pub fn select_for<R: Record>(&self) -> OrmResult<SelectQuery> {
        SelectQuery::for_record_with_options::<R>(self.config.build_options())
    }

    pub fn update_query(&self, table: &str) -> UpdateQuery {
        UpdateQuery::with_options(table, self.config.build_options())
    }

    pub fn update_for<R: Record>(&self) -> OrmResult<UpdateQuery> {
        UpdateQuery::for_record_with_options::<R>(self.config.build_options())
    }

    pub fn delete_query(&self, table: &str) -> DeleteQuery {
        DeleteQuery::with_options(table, self.config.build_options())
    }

    pub fn delete_for<R: Record>(&self) -> OrmResult<DeleteQuery> {
        DeleteQuery::for_record_with_options::<R>(self.config.build_options())
    }

    fn context(&self, sql: &str, params: &[Value], tag: Option<&str>) -> QueryContext {
        let ctx = QueryContext::new(sql, params);
        match tag {
            Some(tag) => ctx.with_tag(tag),
            None => ctx,
        }
    }

    /// Time one statement and report it to the monitors.
    async fn observe<T>(
        &self,
        ctx: &QueryContext,
        statement: impl Future<Output = OrmResult<T>>,
        summarize: impl FnOnce(&T) -> QueryResult,
    ) -> OrmResult<T> {
        self.monitor.on_query_start(ctx);
        let started = Instant::now();
        let result = statement.await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(value) => summarize(value),
            Err(err) => QueryResult::error(err.to_string()),
        };
        self.monitor.on_query_complete(ctx, elapsed, &outcome);
        if elapsed > self.config.slow_query_threshold {
            self.monitor.on_slow_query(ctx, elapsed);
        }
        result
    }

    pub(crate) async fn run_execute(
        &self,
        conn: &mut P::Connection,
        sql: &str,
        params: &[Value],
        tag: Option<&str>,
    ) -> OrmResult<u64> {
        let ctx = self.context(sql, params, tag);
        self.observe(&ctx, conn.execute(sql, params), |n| QueryResult::Affected(*n))
            .await
    }

    pub(crate) async fn run_query(
        &self,
        conn: &mut P::Connection,
        sql: &str,
        params: &[Value],
        tag: Option<&str>,
    ) -> OrmResult<Vec<Row>> {
        let ctx = self.context(sql, params, tag);
        self.observe(&ctx, conn.query(sql, params), |rows| QueryResult::Rows(rows.len()))
            .await
    }

    pub(crate) async fn run_batch(
        &self,
        conn: &mut P::Connection,
        sql: &str,
        tag: Option<&str>,
    ) -> OrmResult<()> {
        let ctx = self.context(sql, &[], tag);
        self.observe(&ctx, conn.batch_execute(sql), |_| QueryResult::Done)
            .await
    }
}
