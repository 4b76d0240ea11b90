use super::{BuildOptions, Query, QueryCore};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassHandler, Record};
use crate::value::Value;

/// `DELETE` builder.
///
/// Parameter order is JOIN, then WHERE. A DELETE without a WHERE clause is rejected unless
/// [`allow_unfiltered`](DeleteQuery::allow_unfiltered) was called.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    core: QueryCore,
    allow_unfiltered: bool,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_options(table, BuildOptions::default())
    }

    pub fn with_options(table: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            core: QueryCore::new(table, options),
            allow_unfiltered: false,
        }
    }

    /// Delete from the table mapped by `R`.
    pub fn for_record<R: Record>() -> OrmResult<Self> {
        Self::for_record_with_options::<R>(BuildOptions::default())
    }

    pub fn for_record_with_options<R: Record>(options: BuildOptions) -> OrmResult<Self> {
        let handler = ClassHandler::of::<R>()?;
        Ok(Self::with_options(handler.table_name(), options))
    }

    /// Permit deleting every row of the table.
    pub fn allow_unfiltered(&mut self, allow: bool) -> &mut Self {
        self.allow_unfiltered = allow;
        self
    }
}

impl Query for DeleteQuery {
    fn core(&self) -> &QueryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut QueryCore {
        &mut self.core
    }

    fn validate(&self) -> OrmResult<()> {
        self.core.validate_table()?;
        if self.core.where_sql().is_empty() && !self.allow_unfiltered {
            return Err(OrmError::validation(format!(
                "DELETE FROM {} has no WHERE clause; call allow_unfiltered(true) to delete all rows",
                self.core.table()
            )));
        }
        Ok(())
    }

    fn query_string(&self) -> String {
        let mut sql = String::from("DELETE FROM ");
        self.core.render_table(&mut sql);
        self.core.render_joins(&mut sql);
        self.core.render_where(&mut sql);
        sql
    }

    fn query_parameters(&self) -> Vec<Value> {
        let mut params = self.core.join_params().to_vec();
        params.extend_from_slice(self.core.where_params());
        params
    }
}
