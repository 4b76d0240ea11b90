use super::Database;
use super::persist;
use crate::config::DatabaseConfig;
use crate::connection::{Connection, ConnectionProvider, Lease};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassHandler, FieldHandler, FieldType, Record};
use crate::query::{ModifyQuery, Query, SelectQuery};
use crate::transaction::{TransactionOptions, check_savepoint_name, next_savepoint_name};
use crate::value::{Row, Value};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Borrow the transaction connection, or acquire a fresh one.
async fn lease<'a, P: ConnectionProvider>(
    db: &Database<P>,
    tx: &'a mut Option<P::Connection>,
) -> OrmResult<Lease<'a, P::Connection>> {
    match tx {
        Some(conn) => Ok(Lease::Held(conn)),
        None => Ok(Lease::Fresh(db.provider().acquire().await?)),
    }
}

/// Run `$body` (a future using `$conn`) on a leased connection, releasing it afterwards
/// whatever the outcome.
macro_rules! with_connection {
    ($session:expr, |$db:ident, $conn:ident| $body:expr) => {{
        $session.recover_abandoned().await;
        let $db = $session.db;
        let mut leased = lease($db, &mut $session.tx).await?;
        let result = {
            let $conn = leased.conn();
            $body.await
        };
        leased.release().await;
        result
    }};
}

fn expect_one(affected: u64, sql: &str) -> OrmResult<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(OrmError::RowCount {
            expected: 1,
            got: affected,
            sql: sql.to_string(),
        })
    }
}

fn single_row(mut rows: Vec<Row>, handler: &ClassHandler, id: i64) -> OrmResult<Row> {
    match rows.len() {
        0 => Err(OrmError::not_found(format!(
            "{} with {}={id}",
            handler.type_name(),
            handler.require_identity()?.column()
        ))),
        1 => rows
            .pop()
            .ok_or_else(|| OrmError::not_found(handler.type_name())),
        n => Err(OrmError::too_many_rows(1, n)),
    }
}

/// First column of the first row as an integer.
fn scalar_i64(rows: &[Row], what: &str) -> OrmResult<i64> {
    let value = rows
        .first()
        .and_then(|row| row.get_index(0))
        .cloned()
        .ok_or_else(|| OrmError::decode(what, "no value returned"))?;
    FieldType::Long
        .coerce(value)
        .map_err(|e| OrmError::decode(what, e.to_string()))?
        .as_i64()
        .ok_or_else(|| OrmError::decode(what, "NULL returned"))
}

/// Marks the session when a transaction body is dropped before its outcome is settled.
struct SettleGuard {
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl SettleGuard {
    fn arm(abandoned: &Arc<AtomicBool>) -> Self {
        Self {
            abandoned: Arc::clone(abandoned),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
        }
    }
}

pub(super) fn retry_delay(config: &DatabaseConfig) -> Duration {
    let millis = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    let min = millis(config.retry_backoff_min);
    let max = millis(config.retry_backoff_max).max(min);
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

impl<P: ConnectionProvider> Database<P> {
    /// Copy the database-computed values of `fields` back into `record`.
    async fn read_back<R: Record>(
        &self,
        conn: &mut P::Connection,
        handler: &ClassHandler,
        record: &mut R,
        id: i64,
        fields: &[usize],
        tag: &str,
    ) -> OrmResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let query = persist::select_by_id(handler, id, Some(fields), &self.config.build_options())?;
        let rows = self
            .run_query(conn, &query.query_string(), &query.query_parameters(), Some(tag))
            .await?;
        let row = single_row(rows, handler, id)?;
        handler.read_row(record, &row)?;
        Ok(())
    }
}

/// A unit of work against a [`Database`].
///
/// The session owns the transaction state: between [`Session::start_transaction`] and
/// [`Session::commit`]/[`Session::rollback`] every operation runs on the transaction's
/// connection. A transaction whose [`Session::transaction`] future is cancelled is rolled
/// back before the session's next operation; dropping a session with an open transaction
/// rolls it back in the background.
pub struct Session<'db, P: ConnectionProvider> {
    db: &'db Database<P>,
    tx: Option<P::Connection>,
    abandoned: Arc<AtomicBool>,
}

impl<P: ConnectionProvider> std::fmt::Debug for Session<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transaction_active", &self.tx.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: ConnectionProvider> Drop for Session<'_, P> {
    fn drop(&mut self) {
        let Some(conn) = self.tx.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    target: "sqlrecord::engine",
                    "session dropped with an open transaction; rolling back"
                );
                handle.spawn(roll_back_abandoned(conn));
            }
            Err(_) => {
                tracing::warn!(
                    target: "sqlrecord::engine",
                    "session dropped with an open transaction outside a runtime; discarding the connection"
                );
                conn.discard();
            }
        }
    }
}

/// Roll back a transaction whose session went away, then release its connection.
///
/// A connection whose rollback fails is discarded so it never reaches another caller.
async fn roll_back_abandoned<C: Connection>(mut conn: C) {
    match conn.batch_execute("ROLLBACK").await {
        Ok(()) => conn.close().await,
        Err(err) => {
            tracing::warn!(
                target: "sqlrecord::engine",
                error = %err,
                "rollback of abandoned transaction failed; discarding the connection"
            );
            conn.discard();
        }
    }
}

impl<'db, P: ConnectionProvider> Session<'db, P> {
    pub(super) fn new(db: &'db Database<P>) -> Self {
        Self {
            db,
            tx: None,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn database(&self) -> &'db Database<P> {
        self.db
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    /// Run a `SELECT` and return the raw rows.
    pub async fn query_rows(&mut self, query: &SelectQuery) -> OrmResult<Vec<Row>> {
        query.validate()?;
        let sql = query.query_string();
        let params = query.query_parameters();
        with_connection!(self, |db, conn| db.run_query(conn, &sql, &params, None))
    }

    /// Run a `SELECT` and map every row to `R`.
    pub async fn query<R: Record + Default>(&mut self, query: &SelectQuery) -> OrmResult<Vec<R>> {
        let handler = ClassHandler::of::<R>()?;
        let rows = self.query_rows(query).await?;
        rows.iter().map(|row| handler.from_row(row)).collect()
    }

    /// Exactly one row: none is `NotFound`, several are `TooManyRows`.
    pub async fn query_one<R: Record + Default>(&mut self, query: &SelectQuery) -> OrmResult<R> {
        match self.query_opt(query).await? {
            Some(record) => Ok(record),
            None => Err(OrmError::not_found(format!(
                "no {} matches: {}",
                R::descriptor().type_name,
                query.query_string()
            ))),
        }
    }

    /// At most one row.
    pub async fn query_opt<R: Record + Default>(
        &mut self,
        query: &SelectQuery,
    ) -> OrmResult<Option<R>> {
        let handler = ClassHandler::of::<R>()?;
        let rows = self.query_rows(query).await?;
        match rows.as_slice() {
            [] => Ok(None),
            [row] => handler.from_row(row).map(Some),
            _ => Err(OrmError::too_many_rows(1, rows.len())),
        }
    }

    /// `SELECT COUNT(*)` over the query's table, joins and filter.
    pub async fn count(&mut self, query: &SelectQuery) -> OrmResult<i64> {
        query.validate()?;
        let sql = query.count_string();
        let params = query.query_parameters();
        let rows = with_connection!(self, |db, conn| db.run_query(conn, &sql, &params, None))?;
        scalar_i64(&rows, "count")
    }

    /// Load the record whose identity is `id`.
    pub async fn load<R: Record + Default>(&mut self, id: i64) -> OrmResult<R> {
        let handler = ClassHandler::of::<R>()?;
        let query = persist::select_by_id(&handler, id, None, &self.db.config().build_options())?;
        let rows = self.query_rows(&query).await?;
        handler.from_row(&single_row(rows, &handler, id)?)
    }

    // ── Builder-driven and raw statements ──────────────────────────────────

    /// Run an `UPDATE` or `DELETE` builder; returns the number of affected rows.
    pub async fn execute<Q: ModifyQuery>(&mut self, query: &Q) -> OrmResult<u64> {
        query.validate()?;
        let sql = query.query_string();
        let params = query.query_parameters();
        with_connection!(self, |db, conn| db.run_execute(conn, &sql, &params, None))
    }

    /// Run hand-written SQL with `?` placeholders.
    pub async fn execute_sql(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        with_connection!(self, |db, conn| db.run_execute(conn, sql, params, None))
    }

    /// Run one or more parameterless statements.
    pub async fn batch_execute(&mut self, sql: &str) -> OrmResult<()> {
        with_connection!(self, |db, conn| db.run_batch(conn, sql, None))
    }

    /// Create the table mapped by `R` from its schema text.
    pub async fn create_table<R: Record>(&mut self) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let tag = format!("{}.create_table", handler.type_name());
        with_connection!(self, |db, conn| db.run_batch(
            conn,
            handler.create_schema(),
            Some(&tag)
        ))
    }

    // ── Record persistence ─────────────────────────────────────────────────

    /// Update the record if it has been stored, insert it otherwise.
    pub async fn store<R: Record>(&mut self, record: &mut R) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        if handler.is_persisted(record)? {
            self.update(record).await
        } else {
            self.insert(record).await
        }
    }

    /// Insert the record.
    ///
    /// A generated identity is fetched and written back, then fields the database stamped
    /// with "now" are re-read into the record. All of it runs on one connection.
    pub async fn insert<R: Record>(&mut self, record: &mut R) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let options = self.db.config().build_options();
        let prepared = persist::insert_statement(&handler, record, &options)?;
        let tag = format!("{}.insert", handler.type_name());

        with_connection!(self, |db, conn| async {
            let affected = db
                .run_execute(conn, &prepared.sql, &prepared.params, Some(&tag))
                .await?;
            expect_one(affected, &prepared.sql)?;
            if handler.identity().is_none() {
                return Ok(());
            }
            let id = match handler.persisted_id(record)? {
                Some(id) => id,
                None => {
                    let rows = db
                        .run_query(conn, options.dialect.last_insert_id(), &[], Some(&tag))
                        .await?;
                    let id = scalar_i64(&rows, "generated identity")?;
                    handler.set_identity(record, id)?;
                    id
                }
            };
            db.read_back(conn, &handler, record, id, &prepared.now_fields, &tag)
                .await
        })
    }

    /// Update every persisted field of a stored record.
    pub async fn update<R: Record>(&mut self, record: &mut R) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let fields: Vec<&FieldHandler> = handler.fields().iter().collect();
        self.update_with(&handler, record, &fields).await
    }

    /// Update only the named fields (field or column names) of a stored record.
    pub async fn update_fields<R: Record>(&mut self, record: &mut R, names: &[&str]) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let fields = handler.fields_named(names)?;
        self.update_with(&handler, record, &fields).await
    }

    async fn update_with<R: Record>(
        &mut self,
        handler: &ClassHandler,
        record: &mut R,
        fields: &[&FieldHandler],
    ) -> OrmResult<()> {
        let prepared =
            persist::update_statement(handler, record, fields, &self.db.config().build_options())?;
        let (_, id) = persist::stored_identity(handler, record, "update")?;
        let tag = format!("{}.update", handler.type_name());

        with_connection!(self, |db, conn| async {
            let affected = db
                .run_execute(conn, &prepared.sql, &prepared.params, Some(&tag))
                .await?;
            expect_one(affected, &prepared.sql)?;
            db.read_back(conn, handler, record, id, &prepared.now_fields, &tag)
                .await
        })
    }

    /// Delete a stored record by identity. The record itself is left unchanged.
    pub async fn delete<R: Record>(&mut self, record: &R) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let prepared =
            persist::delete_statement(&handler, record, &self.db.config().build_options())?;
        let tag = format!("{}.delete", handler.type_name());
        let affected = with_connection!(self, |db, conn| db.run_execute(
            conn,
            &prepared.sql,
            &prepared.params,
            Some(&tag)
        ))?;
        expect_one(affected, &prepared.sql)
    }

    /// Re-read a stored record, overwriting the fields whose columns come back.
    pub async fn refresh<R: Record>(&mut self, record: &mut R) -> OrmResult<()> {
        let handler = ClassHandler::of::<R>()?;
        let (_, id) = persist::stored_identity(&handler, record, "refresh")?;
        let query = persist::select_by_id(&handler, id, None, &self.db.config().build_options())?;
        let rows = self.query_rows(&query).await?;
        let row = single_row(rows, &handler, id)?;
        handler.read_row(record, &row)?;
        Ok(())
    }

    // ── Transactions ───────────────────────────────────────────────────────

    /// Roll back a transaction left open by a cancelled [`Session::transaction`] call.
    /// Returns whether there was one.
    async fn recover_abandoned(&mut self) -> bool {
        if !self.abandoned.swap(false, Ordering::AcqRel) {
            return false;
        }
        let Some(mut conn) = self.tx.take() else {
            return false;
        };
        tracing::warn!(
            target: "sqlrecord::engine",
            "transaction body was cancelled; rolling back its transaction"
        );
        match self.db.run_batch(&mut conn, "ROLLBACK", None).await {
            Ok(()) => conn.close().await,
            Err(err) => {
                tracing::warn!(
                    target: "sqlrecord::engine",
                    error = %err,
                    "rollback of cancelled transaction failed; discarding the connection"
                );
                conn.discard();
            }
        }
        true
    }

    pub fn is_transaction_active(&self) -> bool {
        self.tx.is_some() && !self.abandoned.load(Ordering::Acquire)
    }

    /// Acquire a connection and begin a transaction on it.
    pub async fn start_transaction(&mut self, options: TransactionOptions) -> OrmResult<()> {
        self.recover_abandoned().await;
        if self.tx.is_some() {
            return Err(OrmError::Transaction(
                "a transaction is already active in this session".into(),
            ));
        }
        let db = self.db;
        let mut conn = db.provider().acquire().await?;
        let begin = options.begin_sql(db.config().dialect);
        match db.run_batch(&mut conn, &begin, None).await {
            Ok(()) => {
                self.tx = Some(conn);
                Ok(())
            }
            Err(err) => {
                conn.close().await;
                Err(err)
            }
        }
    }

    pub async fn commit(&mut self) -> OrmResult<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(&mut self) -> OrmResult<()> {
        self.finish("ROLLBACK").await
    }

    /// End the transaction and release its connection, even if the statement fails.
    async fn finish(&mut self, sql: &str) -> OrmResult<()> {
        if self.recover_abandoned().await && sql == "ROLLBACK" {
            return Ok(());
        }
        let mut conn = self.tx.take().ok_or_else(|| {
            OrmError::Transaction(format!("{sql} without an active transaction"))
        })?;
        let result = self.db.run_batch(&mut conn, sql, None).await;
        conn.close().await;
        result
    }

    pub async fn savepoint(&mut self, name: &str) -> OrmResult<()> {
        self.savepoint_command("SAVEPOINT", name).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> OrmResult<()> {
        self.savepoint_command("ROLLBACK TO SAVEPOINT", name).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> OrmResult<()> {
        self.savepoint_command("RELEASE SAVEPOINT", name).await
    }

    async fn savepoint_command(&mut self, command: &str, name: &str) -> OrmResult<()> {
        check_savepoint_name(name)?;
        self.recover_abandoned().await;
        let db = self.db;
        let conn = self.tx.as_mut().ok_or_else(|| {
            OrmError::Transaction(format!("{command} {name} without an active transaction"))
        })?;
        db.run_batch(conn, &format!("{command} {name}"), None).await
    }

    /// Run `body` inside an anonymous savepoint of the active transaction.
    ///
    /// The savepoint is released when `body` succeeds and rolled back to when it fails;
    /// the transaction stays open either way.
    pub async fn in_savepoint<T, F>(&mut self, body: F) -> OrmResult<T>
    where
        F: AsyncFnOnce(&mut Self) -> OrmResult<T>,
    {
        let name = next_savepoint_name();
        self.savepoint(&name).await?;
        match body(&mut *self).await {
            Ok(value) => {
                self.release_savepoint(&name).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_to_savepoint(&name).await {
                    tracing::warn!(
                        target: "sqlrecord::engine",
                        error = %rollback_err,
                        savepoint = %name,
                        "rollback to savepoint failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Commit on success; on failure roll back if the transaction is still open.
    async fn settle<T>(&mut self, outcome: OrmResult<T>) -> OrmResult<T> {
        match outcome {
            Ok(value) => {
                if self.tx.is_some() {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if self.tx.is_some() {
                    if let Err(rollback_err) = self.rollback().await {
                        tracing::warn!(
                            target: "sqlrecord::engine",
                            error = %rollback_err,
                            "rollback failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Start a transaction, run `body`, and commit; roll back and return the error if
    /// `body` or the commit fails.
    pub async fn transaction<T, F>(&mut self, options: TransactionOptions, body: F) -> OrmResult<T>
    where
        F: AsyncFnOnce(&mut Self) -> OrmResult<T>,
    {
        self.start_transaction(options).await?;
        let guard = SettleGuard::arm(&self.abandoned);
        let outcome = body(&mut *self).await;
        let settled = self.settle(outcome).await;
        guard.disarm();
        settled
    }

    /// Like [`Session::transaction`], retrying the whole transaction when it fails with a
    /// serialization conflict.
    ///
    /// Retries pause for a random 10–100 ms (configurable) and stop after
    /// `max_transaction_attempts`, returning [`OrmError::RetriesExhausted`] wrapping the
    /// last conflict. Any other error is returned immediately.
    pub async fn transaction_with_retry<T, F>(
        &mut self,
        options: TransactionOptions,
        mut body: F,
    ) -> OrmResult<T>
    where
        F: AsyncFnMut(&mut Self) -> OrmResult<T>,
    {
        let max_attempts = self.db.config().max_transaction_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match self.start_transaction(options).await {
                Ok(()) => {
                    let guard = SettleGuard::arm(&self.abandoned);
                    let outcome = body(&mut *self).await;
                    let settled = self.settle(outcome).await;
                    guard.disarm();
                    settled
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_serialization_conflict() => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            target: "sqlrecord::engine",
                            attempts = attempt,
                            error = %err,
                            "giving up on conflicting transaction"
                        );
                        return Err(OrmError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = retry_delay(self.db.config());
                    tracing::debug!(
                        target: "sqlrecord::engine",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying conflicting transaction"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
