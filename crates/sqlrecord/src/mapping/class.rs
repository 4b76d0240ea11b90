use super::field::FieldHandler;
use super::{Record, RecordDescriptor, registry};
use crate::error::{OrmError, OrmResult};
use crate::value::{Row, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

const DEFAULT_IDENTITY: &str = "id";

/// Table, schema and field handlers of one record type.
///
/// Built once per type by [`ClassHandler::of`] and shared for the life of the process.
#[derive(Debug)]
pub struct ClassHandler {
    type_id: TypeId,
    type_name: &'static str,
    table_name: &'static str,
    create_schema: String,
    fields: Vec<FieldHandler>,
    by_name: HashMap<String, usize>,
    identity: Option<usize>,
}

impl ClassHandler {
    /// The cached handler for `R`, built on first use.
    pub fn of<R: Record>() -> OrmResult<Arc<ClassHandler>> {
        registry::handler_for::<R>()
    }

    pub(crate) fn build(type_id: TypeId, descriptor: &RecordDescriptor) -> Result<Self, String> {
        let type_name = descriptor.type_name;
        if descriptor.table.trim().is_empty() {
            return Err(format!("{type_name} has an empty table name"));
        }
        if descriptor.fields.is_empty() {
            return Err(format!("{type_name} has no persisted fields"));
        }

        let fields: Vec<FieldHandler> = descriptor
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldHandler::new(field, index))
            .collect();

        let mut by_name = HashMap::with_capacity(fields.len() * 2);
        let mut columns = HashMap::with_capacity(fields.len());
        for field in &fields {
            match by_name.entry(field.name().to_ascii_lowercase()) {
                Entry::Occupied(_) => {
                    return Err(format!("{type_name} declares field '{}' twice", field.name()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(field.index());
                }
            }
            if let Some(other) = columns.insert(field.column().to_ascii_lowercase(), field.name()) {
                return Err(format!(
                    "{type_name} maps fields '{other}' and '{}' to column '{}'",
                    field.name(),
                    field.column()
                ));
            }
        }
        for field in &fields {
            by_name
                .entry(field.column().to_ascii_lowercase())
                .or_insert(field.index());
        }

        let identity = match descriptor.identity {
            Some(declared) => Some(
                fields
                    .iter()
                    .position(|f| f.name().eq_ignore_ascii_case(declared))
                    .ok_or_else(|| {
                        format!("{type_name} declares identity '{declared}' but has no such field")
                    })?,
            ),
            None => fields
                .iter()
                .position(|f| f.name().eq_ignore_ascii_case(DEFAULT_IDENTITY)),
        };
        if let Some(index) = identity {
            let field = &fields[index];
            if !field.field_type().is_integer() {
                return Err(format!(
                    "{type_name}.{} is the identity but has non-integer type {}",
                    field.name(),
                    field.field_type()
                ));
            }
        }

        let create_schema = match descriptor.schema {
            Some(schema) => schema.to_string(),
            None => derive_schema(descriptor.table, &fields, identity),
        };

        tracing::debug!(
            target: "sqlrecord::mapping",
            record = type_name,
            table = descriptor.table,
            fields = fields.len(),
            "built class handler"
        );

        Ok(Self {
            type_id,
            type_name,
            table_name: descriptor.table,
            create_schema,
            fields,
            by_name,
            identity,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// `CREATE TABLE` statement for this record's table.
    pub fn create_schema(&self) -> &str {
        &self.create_schema
    }

    pub fn fields(&self) -> &[FieldHandler] {
        &self.fields
    }

    /// Look a field up by field or column name, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&FieldHandler> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&index| &self.fields[index])
    }

    pub fn identity(&self) -> Option<&FieldHandler> {
        self.identity.map(|index| &self.fields[index])
    }

    /// The identity field, or a mapping error naming the record type.
    pub fn require_identity(&self) -> OrmResult<&FieldHandler> {
        self.identity().ok_or_else(|| {
            OrmError::mapping(format!("{} has no identity field", self.type_name))
        })
    }

    /// Resolve field names for a partial update; unknown names are a validation error.
    pub fn fields_named(&self, names: &[&str]) -> OrmResult<Vec<&FieldHandler>> {
        names
            .iter()
            .map(|name| {
                self.field(name).ok_or_else(|| {
                    OrmError::validation(format!("{} has no field '{name}'", self.type_name))
                })
            })
            .collect()
    }

    fn check<R: Record>(&self) -> OrmResult<()> {
        if TypeId::of::<R>() != self.type_id {
            return Err(OrmError::mapping(format!(
                "handler for {} used with {}",
                self.type_name,
                R::descriptor().type_name
            )));
        }
        Ok(())
    }

    /// The record's identity when it has been persisted.
    ///
    /// Null and negative values mean "not yet stored".
    pub fn persisted_id<R: Record>(&self, record: &R) -> OrmResult<Option<i64>> {
        self.check::<R>()?;
        let identity = self.require_identity()?;
        match identity.raw_value(record) {
            Value::Null => Ok(None),
            Value::Int(id) => Ok((id >= 0).then_some(id)),
            other => Err(OrmError::mapping(format!(
                "{}.{} holds non-integer identity {other}",
                self.type_name,
                identity.name()
            ))),
        }
    }

    pub fn is_persisted<R: Record>(&self, record: &R) -> OrmResult<bool> {
        Ok(self.persisted_id(record)?.is_some())
    }

    /// Write a generated identity into the record.
    pub fn set_identity<R: Record>(&self, record: &mut R, id: i64) -> OrmResult<()> {
        self.check::<R>()?;
        self.require_identity()?.read_column(record, Value::Int(id))
    }

    /// Overwrite the fields whose columns appear in `row`; other fields are left alone.
    ///
    /// Returns the number of fields copied.
    pub fn read_row<R: Record>(&self, record: &mut R, row: &Row) -> OrmResult<usize> {
        self.check::<R>()?;
        let mut copied = 0;
        for field in &self.fields {
            if field.read_row(record, row)? {
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Build a new record from a row.
    pub fn from_row<R: Record + Default>(&self, row: &Row) -> OrmResult<R> {
        let mut record = R::default();
        self.read_row(&mut record, row)?;
        Ok(record)
    }
}

fn derive_schema(table: &str, fields: &[FieldHandler], identity: Option<usize>) -> String {
    let columns: Vec<String> = fields
        .iter()
        .map(|field| {
            let mut column = format!("{} {}", field.column(), field.field_type().ddl_type());
            if Some(field.index()) == identity {
                column.push_str(" GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY");
            } else if field.is_not_null() {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();
    format!("CREATE TABLE {table} ({})", columns.join(", "))
}
