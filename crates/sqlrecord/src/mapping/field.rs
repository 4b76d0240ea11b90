use super::types::{FieldType, SqlType};
use super::{FieldDescriptor, Record};
use crate::error::{OrmError, OrmResult};
use crate::value::{Row, Value};

/// Converter between one record field and one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandler {
    name: &'static str,
    column: &'static str,
    field_type: FieldType,
    not_null: bool,
    index: usize,
}

impl FieldHandler {
    pub(crate) fn new(descriptor: &FieldDescriptor, index: usize) -> Self {
        Self {
            name: descriptor.name,
            column: descriptor.column,
            field_type: descriptor.field_type,
            not_null: descriptor.not_null,
            index,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.field_type.sql_type()
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The field's value as held by the record, without checks.
    pub fn raw_value<R: Record>(&self, record: &R) -> Value {
        record.field_value(self.index)
    }

    /// The field's value for use as a statement parameter.
    ///
    /// Fails when a `not_null` field holds null.
    pub fn bind_value<R: Record>(&self, record: &R) -> OrmResult<Value> {
        let value = self.raw_value(record);
        if value.is_null() && self.not_null {
            return Err(OrmError::validation(format!(
                "{}.{} must not be null",
                R::descriptor().type_name,
                self.name
            )));
        }
        Ok(value)
    }

    /// Store a column value read from the database into the record.
    pub fn read_column<R: Record>(&self, record: &mut R, value: Value) -> OrmResult<()> {
        if value.is_null() && self.not_null {
            return Err(OrmError::decode(self.column, "NULL in a not-null field"));
        }
        let value = self
            .field_type
            .coerce(value)
            .map_err(|e| OrmError::decode(self.column, e.to_string()))?;
        record
            .set_field_value(self.index, value)
            .map_err(|e| OrmError::decode(self.column, e.to_string()))
    }

    /// Copy this field's column from `row`, if the row has it.
    ///
    /// Returns whether the column was present.
    pub fn read_row<R: Record>(&self, record: &mut R, row: &Row) -> OrmResult<bool> {
        match row.get(self.column) {
            Some(value) => {
                self.read_column(record, value.clone())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
