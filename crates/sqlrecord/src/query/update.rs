use super::builder::{check_placeholders, embed_value, fill_placeholders};
use super::{BuildOptions, Query, QueryCore};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassHandler, Record};
use crate::value::Value;

/// `UPDATE` builder.
///
/// Parameter order is JOIN, SET, then WHERE.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    core: QueryCore,
    set_sql: String,
    set_params: Vec<Value>,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_options(table, BuildOptions::default())
    }

    pub fn with_options(table: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            core: QueryCore::new(table, options),
            set_sql: String::new(),
            set_params: Vec::new(),
        }
    }

    /// Update the table mapped by `R`.
    pub fn for_record<R: Record>() -> OrmResult<Self> {
        Self::for_record_with_options::<R>(BuildOptions::default())
    }

    pub fn for_record_with_options<R: Record>(options: BuildOptions) -> OrmResult<Self> {
        let handler = ClassHandler::of::<R>()?;
        Ok(Self::with_options(handler.table_name(), options))
    }

    fn open_set(&mut self) {
        if !self.set_sql.is_empty() {
            self.set_sql.push(',');
        }
    }

    /// `<column>=<value>`; [`Value::ServerNow`] renders the current-timestamp expression.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.open_set();
        self.set_sql.push_str(column);
        self.set_sql.push('=');
        embed_value(
            self.core.options(),
            value.into(),
            &mut self.set_sql,
            &mut self.set_params,
        );
        self
    }

    /// `<column>=<current timestamp>`.
    pub fn set_now(&mut self, column: &str) -> &mut Self {
        self.set(column, Value::ServerNow)
    }

    /// Raw assignment text whose `?` marks are bound to `params`.
    pub fn set_raw<I>(&mut self, text: &str, params: I) -> OrmResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let params: Vec<Value> = params.into_iter().map(Into::into).collect();
        check_placeholders(text, params.len())?;
        self.open_set();
        fill_placeholders(
            self.core.options(),
            text,
            params,
            &mut self.set_sql,
            &mut self.set_params,
        );
        Ok(self)
    }

    pub fn set_clause(&self) -> &str {
        &self.set_sql
    }
}

impl Query for UpdateQuery {
    fn core(&self) -> &QueryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut QueryCore {
        &mut self.core
    }

    fn validate(&self) -> OrmResult<()> {
        self.core.validate_table()?;
        if self.set_sql.is_empty() {
            return Err(OrmError::validation(format!(
                "UPDATE {} has no SET clause",
                self.core.table()
            )));
        }
        Ok(())
    }

    fn query_string(&self) -> String {
        let mut sql = String::from("UPDATE ");
        self.core.render_table(&mut sql);
        self.core.render_joins(&mut sql);
        sql.push_str(&self.core.options().separator);
        sql.push_str("SET ");
        sql.push_str(&self.set_sql);
        self.core.render_where(&mut sql);
        sql
    }

    fn query_parameters(&self) -> Vec<Value> {
        let mut params = self.core.join_params().to_vec();
        params.extend_from_slice(&self.set_params);
        params.extend_from_slice(self.core.where_params());
        params
    }
}
