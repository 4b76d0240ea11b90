//! Statements that write whole records.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassHandler, FieldHandler, Record};
use crate::query::builder::embed_value;
use crate::query::{BuildOptions, DeleteQuery, Query, SelectQuery, UpdateQuery};
use crate::value::Value;

/// Statement text, parameters and the fields the database will stamp with "now".
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Prepared {
    pub sql: String,
    pub params: Vec<Value>,
    pub now_fields: Vec<usize>,
}

fn is_assigned_id(value: &Value) -> bool {
    matches!(value, Value::Int(id) if *id >= 0)
}

/// `INSERT INTO <table> (<cols>) VALUES (<vals>)`.
///
/// An identity that is null or negative is left out so the database generates it.
pub(crate) fn insert_statement<R: Record>(
    handler: &ClassHandler,
    record: &R,
    options: &BuildOptions,
) -> OrmResult<Prepared> {
    let identity = handler.identity().map(FieldHandler::index);
    let mut columns = Vec::with_capacity(handler.fields().len());
    let mut values = String::new();
    let mut params = Vec::new();
    let mut now_fields = Vec::new();

    for field in handler.fields() {
        if Some(field.index()) == identity && !is_assigned_id(&field.raw_value(record)) {
            continue;
        }
        let value = field.bind_value(record)?;
        if matches!(value, Value::ServerNow) {
            now_fields.push(field.index());
        }
        if !columns.is_empty() {
            values.push(',');
        }
        columns.push(field.column());
        embed_value(options, value, &mut values, &mut params);
    }

    let table = handler.table_name();
    let sql = if columns.is_empty() {
        match options.dialect {
            Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
            Dialect::Postgres | Dialect::Sqlite => format!("INSERT INTO {table} DEFAULT VALUES"),
        }
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({values})",
            columns.join(",")
        )
    };
    Ok(Prepared {
        sql,
        params,
        now_fields,
    })
}

/// Identity column and value of a stored record; unsaved records cannot be addressed.
pub(crate) fn stored_identity<'h, R: Record>(
    handler: &'h ClassHandler,
    record: &R,
    operation: &str,
) -> OrmResult<(&'h FieldHandler, i64)> {
    let identity = handler.require_identity()?;
    match handler.persisted_id(record)? {
        Some(id) => Ok((identity, id)),
        None => Err(OrmError::validation(format!(
            "cannot {operation} {}: record has not been stored",
            handler.type_name()
        ))),
    }
}

/// `UPDATE <table> SET <col>=<val>,... WHERE <identity>=<id>` over `fields`.
///
/// The identity is never part of the SET list. An empty list is a validation error.
pub(crate) fn update_statement<R: Record>(
    handler: &ClassHandler,
    record: &R,
    fields: &[&FieldHandler],
    options: &BuildOptions,
) -> OrmResult<Prepared> {
    let (identity, id) = stored_identity(handler, record, "update")?;
    let mut query = UpdateQuery::with_options(handler.table_name(), options.clone());
    let mut now_fields = Vec::new();
    for field in fields.iter().filter(|f| f.index() != identity.index()) {
        let value = field.bind_value(record)?;
        if matches!(value, Value::ServerNow) {
            now_fields.push(field.index());
        }
        query.set(field.column(), value);
    }
    if query.set_clause().is_empty() {
        return Err(OrmError::validation(format!(
            "nothing to update for {}",
            handler.type_name()
        )));
    }
    query.where_equal(identity.column(), id);
    query.validate()?;
    Ok(Prepared {
        sql: query.query_string(),
        params: query.query_parameters(),
        now_fields,
    })
}

/// `DELETE FROM <table> WHERE <identity>=<id>`.
pub(crate) fn delete_statement<R: Record>(
    handler: &ClassHandler,
    record: &R,
    options: &BuildOptions,
) -> OrmResult<Prepared> {
    let (identity, id) = stored_identity(handler, record, "delete")?;
    let mut query = DeleteQuery::with_options(handler.table_name(), options.clone());
    query.where_equal(identity.column(), id);
    query.validate()?;
    Ok(Prepared {
        sql: query.query_string(),
        params: query.query_parameters(),
        now_fields: Vec::new(),
    })
}

/// `SELECT <cols> FROM <table> WHERE <identity>=<id>`; `*` when `fields` is `None`.
pub(crate) fn select_by_id(
    handler: &ClassHandler,
    id: i64,
    fields: Option<&[usize]>,
    options: &BuildOptions,
) -> OrmResult<SelectQuery> {
    let identity = handler.require_identity()?;
    let mut query = SelectQuery::with_options(handler.table_name(), options.clone());
    if let Some(indexes) = fields {
        let columns: Vec<&str> = indexes
            .iter()
            .filter_map(|&index| handler.fields().get(index))
            .map(FieldHandler::column)
            .collect();
        query.columns(&columns.join(","));
    }
    query.where_equal(identity.column(), id);
    Ok(query)
}
