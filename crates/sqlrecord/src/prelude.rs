//! Convenient imports for typical `sqlrecord` usage.
//!
//! ```ignore
//! use sqlrecord::prelude::*;
//! ```

pub use crate::{
    Database, DatabaseConfig, DeleteQuery, OrmError, OrmResult, PgProvider, Query, Record,
    SelectQuery, ServerTime, Session, TransactionOptions, UpdateQuery, Value,
};

#[cfg(feature = "pool")]
pub use crate::{PoolProvider, create_pool};

#[cfg(feature = "derive")]
pub use crate::RecordEnum;
