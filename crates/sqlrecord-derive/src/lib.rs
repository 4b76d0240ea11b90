//! Derive macros for sqlrecord
//!
//! Provides `#[derive(Record)]` and `#[derive(RecordEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod record;
mod record_enum;

/// Derive `Record` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlrecord::Record;
///
/// #[derive(Record, Default)]
/// #[record(table = "users")]
/// struct User {
///     id: Option<i64>,
///     #[record(not_null)]
///     username: String,
///     #[record(column = "email_address")]
///     email: Option<String>,
///     #[record(skip)]
///     session_token: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[record(table = "name")]` - Table name (default: snake_case type name)
/// - `#[record(schema = "CREATE TABLE ...")]` - Explicit schema text
/// - `#[record(identity = "field")]` - Identity field (default: a field named `id`)
/// - `#[record(column = "name")]` - Map field to a different column name
/// - `#[record(identity)]` - Mark the field as the identity
/// - `#[record(not_null)]` - Binding a null value is an error
/// - `#[record(skip)]` - Transient field, never persisted
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `FieldValue` for a fieldless enum, stored by variant name.
///
/// `#[record(rename = "...")]` on a variant changes its stored name.
#[proc_macro_derive(RecordEnum, attributes(record))]
pub fn derive_record_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
