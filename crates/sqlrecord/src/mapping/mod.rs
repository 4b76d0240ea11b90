//! Record mapping: derived descriptors, field and class handlers.
//!
//! `#[derive(Record)]` emits a static [`RecordDescriptor`] plus index-based field access.
//! [`ClassHandler::of`] turns the descriptor into a validated, cached handler that the
//! engine uses to build statements and to read rows back into records.
//!
//! ```ignore
//! use sqlrecord::{Record, RecordEnum, ServerTime};
//!
//! #[derive(RecordEnum, Debug, Clone, Copy, PartialEq, Default)]
//! enum Status { #[default] Active, Suspended }
//!
//! #[derive(Record, Debug, Default)]
//! #[record(table = "person")]
//! struct Person {
//!     id: Option<i64>,
//!     #[record(not_null)]
//!     name: String,
//!     status: Status,
//!     #[record(column = "created_at")]
//!     created: ServerTime<chrono::DateTime<chrono::Utc>>,
//!     #[record(skip)]
//!     cached_label: String,
//! }
//! ```

mod class;
mod field;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use class::ClassHandler;
pub use field::FieldHandler;
pub use types::{FieldType, FieldValue, LocalizedString, Properties, ServerTime, SqlType};

use crate::value::{ConversionError, Value};

/// Identity value of a record that has not been stored yet.
pub const UNSAVED_ID: i64 = -1;

/// Static description of a record type, produced by `#[derive(Record)]`.
#[derive(Debug)]
pub struct RecordDescriptor {
    /// Rust type name.
    pub type_name: &'static str,
    /// Table name (possibly schema-qualified).
    pub table: &'static str,
    /// Explicit `CREATE TABLE` text; derived from the fields when absent.
    pub schema: Option<&'static str>,
    /// Explicitly declared identity field. When absent a field named `id` is used, if any.
    pub identity: Option<&'static str>,
    /// Persisted fields in declaration order.
    pub fields: &'static [FieldDescriptor],
}

/// Static description of one persisted field.
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: &'static str,
    pub field_type: FieldType,
    pub not_null: bool,
}

/// A struct mapped to a table.
///
/// Field indexes refer to positions in [`RecordDescriptor::fields`].
pub trait Record: Send + Sync + 'static {
    fn descriptor() -> &'static RecordDescriptor;

    /// Current value of the field at `index`. Unknown indexes yield `Value::Null`.
    fn field_value(&self, index: usize) -> Value;

    /// Store `value` into the field at `index`.
    fn set_field_value(&mut self, index: usize, value: Value) -> Result<(), ConversionError>;
}
