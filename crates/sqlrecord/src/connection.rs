//! Connection abstraction the engine executes through.
//!
//! A [`ConnectionProvider`] hands out [`Connection`]s. The engine keeps one connection for
//! the life of a transaction and otherwise acquires a fresh one per operation, closing it
//! on every path.

use crate::error::OrmResult;
use crate::value::{Row, Value};
use std::future::Future;

/// One live database connection.
///
/// Statements use `?` placeholders; implementations translate them to the driver's syntax.
/// Transaction control (`BEGIN`, `COMMIT`, savepoints) is sent through
/// [`Connection::batch_execute`].
pub trait Connection: Send {
    /// Execute a statement and return the number of affected rows.
    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute a query and return all rows.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute one or more parameterless statements.
    fn batch_execute(&mut self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send;

    /// Give the connection back. The default simply drops it.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized,
    {
        async move { drop(self) }
    }

    /// Throw the connection away without handing it back for reuse.
    ///
    /// Used when the connection may still be inside a transaction that could not be rolled
    /// back. The default simply drops it.
    fn discard(self)
    where
        Self: Sized,
    {
        drop(self)
    }
}

/// Source of connections (a pool, a connect-per-call factory, a test double).
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection + 'static;

    fn acquire(&self) -> impl Future<Output = OrmResult<Self::Connection>> + Send;
}

/// A connection borrowed for one engine operation.
///
/// `Held` borrows the session's transaction connection and leaves it open; `Fresh` owns a
/// newly acquired connection and closes it on [`Lease::release`].
pub(crate) enum Lease<'a, C> {
    Held(&'a mut C),
    Fresh(C),
}

impl<C: Connection> Lease<'_, C> {
    pub(crate) fn conn(&mut self) -> &mut C {
        match self {
            Lease::Held(conn) => &mut **conn,
            Lease::Fresh(conn) => conn,
        }
    }

    pub(crate) async fn release(self) {
        if let Lease::Fresh(conn) = self {
            conn.close().await;
        }
    }
}
