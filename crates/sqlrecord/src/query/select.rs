use super::{BuildOptions, Query, QueryCore};
use crate::error::OrmResult;
use crate::mapping::{ClassHandler, Record};
use crate::value::Value;

/// `SELECT` builder.
///
/// Parameter order is JOIN, then WHERE.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    core: QueryCore,
    columns: Option<String>,
    order_by: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_options(table, BuildOptions::default())
    }

    pub fn with_options(table: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            core: QueryCore::new(table, options),
            columns: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Select from the table mapped by `R`.
    pub fn for_record<R: Record>() -> OrmResult<Self> {
        Self::for_record_with_options::<R>(BuildOptions::default())
    }

    pub fn for_record_with_options<R: Record>(options: BuildOptions) -> OrmResult<Self> {
        let handler = ClassHandler::of::<R>()?;
        Ok(Self::with_options(handler.table_name(), options))
    }

    /// Replace `*` with an explicit select list.
    pub fn columns(&mut self, columns: &str) -> &mut Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn order_by(&mut self, order_by: &str) -> &mut Self {
        self.order_by = Some(order_by.to_string());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// `SELECT COUNT(*)` over the same FROM, JOIN and WHERE, without ordering or paging.
    pub fn count_string(&self) -> String {
        let mut sql = String::from("SELECT COUNT(*) FROM ");
        self.core.render_table(&mut sql);
        self.core.render_joins(&mut sql);
        self.core.render_where(&mut sql);
        sql
    }
}

impl Query for SelectQuery {
    fn core(&self) -> &QueryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut QueryCore {
        &mut self.core
    }

    fn query_string(&self) -> String {
        let sep = &self.core.options().separator;
        let mut sql = String::from("SELECT ");
        sql.push_str(self.columns.as_deref().unwrap_or("*"));
        sql.push_str(" FROM ");
        self.core.render_table(&mut sql);
        self.core.render_joins(&mut sql);
        self.core.render_where(&mut sql);
        if let Some(order_by) = &self.order_by {
            sql.push_str(sep);
            sql.push_str("ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!("{sep}LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!("{sep}OFFSET {offset}"));
        }
        sql
    }

    fn query_parameters(&self) -> Vec<Value> {
        let mut params = self.core.join_params().to_vec();
        params.extend_from_slice(self.core.where_params());
        params
    }
}
