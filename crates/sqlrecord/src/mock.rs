//! In-memory connection provider for tests.
//!
//! Replies are scripted by SQL substring; every statement is logged with the id of the
//! connection that ran it, and acquisitions, releases and discards are counted so tests can
//! check that connections are handed back on every path.
//!
//! ```ignore
//! let provider = MockProvider::new();
//! provider.reply("INSERT INTO person", MockReply::Affected(1));
//! provider.reply("lastval", MockReply::rows(["lastval"], [[Value::Int(7)]]));
//! let db = Database::new(provider.clone(), DatabaseConfig::default());
//! ```

use crate::connection::{Connection, ConnectionProvider};
use crate::error::{OrmError, OrmResult};
use crate::value::{Row, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted outcome of a statement.
#[derive(Debug, Clone)]
pub enum MockReply {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(MockFailure),
}

impl MockReply {
    /// Rows sharing one column list.
    pub fn rows<C, R>(columns: C, rows: impl IntoIterator<Item = R>) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Value>,
    {
        let columns: Arc<[String]> = columns.into_iter().map(Into::into).collect();
        MockReply::Rows(
            rows.into_iter()
                .map(|values| Row::new(Arc::clone(&columns), values.into_iter().collect()))
                .collect(),
        )
    }

    /// A serialization failure (SQLSTATE 40001).
    pub fn conflict() -> Self {
        MockReply::Fail(MockFailure::Sqlstate {
            code: "40001".into(),
            message: "could not serialize access due to concurrent update".into(),
        })
    }

    pub fn sqlstate(code: &str, message: &str) -> Self {
        MockReply::Fail(MockFailure::Sqlstate {
            code: code.into(),
            message: message.into(),
        })
    }
}

/// A failure that can be raised any number of times.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Sqlstate { code: String, message: String },
    Connection(String),
}

impl MockFailure {
    fn to_error(&self) -> OrmError {
        match self {
            MockFailure::Sqlstate { code, message } => OrmError::from_sqlstate(code, message.clone()),
            MockFailure::Connection(message) => OrmError::Connection(message.clone()),
        }
    }
}

/// One logged statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Id of the connection that ran it (1-based, in acquisition order).
    pub connection: u64,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug)]
struct Rule {
    needle: String,
    reply: MockReply,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    log: Vec<Statement>,
    acquired: u64,
    released: u64,
    discarded: u64,
    latency: Duration,
    acquire_failure: Option<String>,
}

impl MockState {
    /// Latest matching rule wins, so one-shot replies can shadow standing ones.
    fn reply_for(&mut self, sql: &str) -> Option<MockReply> {
        let rule = self
            .rules
            .iter_mut()
            .rev()
            .find(|rule| rule.remaining != Some(0) && sql.contains(&rule.needle))?;
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.reply.clone())
    }
}

/// Scripted [`ConnectionProvider`]. Clones share script, log and counters.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every statement containing `needle` with `reply`.
    pub fn reply(&self, needle: &str, reply: MockReply) -> &Self {
        self.push_rule(needle, reply, None)
    }

    /// Answer the next statement containing `needle` with `reply`.
    pub fn reply_once(&self, needle: &str, reply: MockReply) -> &Self {
        self.push_rule(needle, reply, Some(1))
    }

    /// Answer the next `times` statements containing `needle` with `reply`.
    pub fn reply_times(&self, needle: &str, reply: MockReply, times: usize) -> &Self {
        self.push_rule(needle, reply, Some(times))
    }

    fn push_rule(&self, needle: &str, reply: MockReply, remaining: Option<usize>) -> &Self {
        self.state().rules.push(Rule {
            needle: needle.to_string(),
            reply,
            remaining,
        });
        self
    }

    /// Delay every following statement by `latency` (on the tokio clock).
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Make every following `acquire` fail (`None` restores normal behaviour).
    pub fn fail_acquire(&self, message: Option<&str>) {
        self.state().acquire_failure = message.map(str::to_string);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.state().log.clone()
    }

    /// Logged SQL text only.
    pub fn sql_log(&self) -> Vec<String> {
        self.state().log.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    pub fn acquired(&self) -> u64 {
        self.state().acquired
    }

    pub fn released(&self) -> u64 {
        self.state().released
    }

    /// Connections thrown away instead of released.
    pub fn discarded(&self) -> u64 {
        self.state().discarded
    }
}

impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    async fn acquire(&self) -> OrmResult<MockConnection> {
        let mut state = self.state();
        if let Some(message) = &state.acquire_failure {
            return Err(OrmError::Connection(message.clone()));
        }
        state.acquired += 1;
        Ok(MockConnection {
            id: state.acquired,
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection handed out by [`MockProvider`].
#[derive(Debug)]
pub struct MockConnection {
    id: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Option<MockReply> {
        let (reply, latency) = {
            let mut state = self.state();
            state.log.push(Statement {
                connection: self.id,
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            (state.reply_for(sql), state.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        reply
    }
}

impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match self.run(sql, params).await {
            None => Ok(0),
            Some(MockReply::Affected(n)) => Ok(n),
            Some(MockReply::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockReply::Fail(failure)) => Err(failure.to_error()),
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        match self.run(sql, params).await {
            None | Some(MockReply::Affected(_)) => Ok(Vec::new()),
            Some(MockReply::Rows(rows)) => Ok(rows),
            Some(MockReply::Fail(failure)) => Err(failure.to_error()),
        }
    }

    async fn batch_execute(&mut self, sql: &str) -> OrmResult<()> {
        match self.run(sql, &[]).await {
            Some(MockReply::Fail(failure)) => Err(failure.to_error()),
            _ => Ok(()),
        }
    }

    async fn close(self) {
        self.state().released += 1;
    }

    fn discard(self) {
        self.state().discarded += 1;
    }
}
