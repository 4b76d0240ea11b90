//! Incremental SQL query builders.
//!
//! Builders assemble clause text with `?` placeholders and a parallel, ordered list of
//! [`Value`] parameters. Nothing here touches a connection; the engine takes the finished
//! text and parameters and executes them.
//!
//! Every WHERE operation comes in a plain form (`where_*`, appends as-is) and an AND form
//! (`and_where_*`), which inserts `AND` unless the WHERE buffer is empty or its last
//! significant character is an opening parenthesis.
//!
//! # Example
//!
//! ```ignore
//! use sqlrecord::query::{Query, SelectQuery};
//!
//! let mut q = SelectQuery::new("person");
//! q.alias("p")
//!     .and_where_equal("age", 30)
//!     .and_where_in("city", ["NYC", "LA"])?;
//!
//! assert_eq!(q.where_clause(), "p.age=30 AND p.city IN (?,?)");
//! ```

pub(crate) mod builder;
mod delete;
mod select;
mod update;

#[cfg(test)]
mod tests;

pub use builder::QueryCore;
pub use delete::DeleteQuery;
pub use select::SelectQuery;
pub use update::UpdateQuery;

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::mapping::{ClassHandler, Record};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

/// Rendering options shared by all builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Emit `?` placeholders for non-literal values. When off, values are inlined as
    /// quoted SQL literals.
    pub parameterized: bool,
    /// Inline booleans, numbers and enum names as literal text even when parameterized.
    pub inline_literals: bool,
    /// Text placed between clauses.
    pub separator: String,
    /// Dialect used for the server-now expression.
    pub dialect: Dialect,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            parameterized: true,
            inline_literals: true,
            separator: " ".to_string(),
            dialect: Dialect::Postgres,
        }
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub const fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

/// How the words of a search phrase combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    /// Every word must match at least one column.
    #[default]
    AllWords,
    /// At least one word must match.
    AnyWord,
}

/// A searchable column in another table, reached through a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignColumn {
    /// Table holding the searched column.
    pub table: String,
    /// Column matched against the search pattern.
    pub column: String,
    /// Column of the queried table that references `table`.
    pub foreign_key: String,
    /// Column of `table` referenced by `foreign_key`.
    pub referenced_key: String,
}

impl ForeignColumn {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        foreign_key: impl Into<String>,
        referenced_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            foreign_key: foreign_key.into(),
            referenced_key: referenced_key.into(),
        }
    }
}

/// A value that can be truncated to a calendar day.
pub trait CalendarDay {
    fn calendar_day(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn calendar_day(&self) -> NaiveDate {
        self.date_naive()
    }
}

impl<T: CalendarDay + ?Sized> CalendarDay for &T {
    fn calendar_day(&self) -> NaiveDate {
        (**self).calendar_day()
    }
}

/// Common builder surface of SELECT, UPDATE and DELETE queries.
///
/// Implementors expose their [`QueryCore`]; the WHERE and JOIN operations are provided.
pub trait Query {
    fn core(&self) -> &QueryCore;

    fn core_mut(&mut self) -> &mut QueryCore;

    /// The complete statement text.
    fn query_string(&self) -> String;

    /// Parameters in placeholder order.
    fn query_parameters(&self) -> Vec<Value>;

    /// Check the builder state before execution.
    fn validate(&self) -> OrmResult<()> {
        self.core().validate_table()
    }

    /// Current WHERE text (without the `WHERE` keyword).
    fn where_clause(&self) -> &str {
        self.core().where_sql()
    }

    /// Current JOIN text.
    fn join_clause(&self) -> &str {
        self.core().join_sql()
    }

    /// Alias the queried table; unqualified columns are prefixed with it.
    fn alias(&mut self, alias: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_alias(alias);
        self
    }

    /// Free text placed right after the table (and alias).
    fn suffix(&mut self, text: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_suffix(text);
        self
    }

    /// Bind non-literal values as parameters (`true`) or inline them as quoted text.
    fn parameterized(&mut self, parameterized: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_parameterized(parameterized);
        self
    }

    /// Inline booleans, numbers and enum names as literal text.
    fn inline_literals(&mut self, inline: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_inline_literals(inline);
        self
    }

    fn separator(&mut self, separator: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_separator(separator);
        self
    }

    fn dialect(&mut self, dialect: Dialect) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().set_dialect(dialect);
        self
    }

    // ==================== Raw text ====================

    /// Append raw WHERE text.
    fn where_(&mut self, text: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_raw(false, text);
        self
    }

    /// Append raw WHERE text, joined with `AND`.
    fn and_where(&mut self, text: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_raw(true, text);
        self
    }

    /// Append raw WHERE text whose `?` marks are filled from `params`, in order.
    fn where_with<I>(&mut self, text: &str, params: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let params = params.into_iter().map(Into::into).collect();
        self.core_mut().push_raw_with(false, text, params)?;
        Ok(self)
    }

    /// [`where_with`](Query::where_with), joined with `AND`.
    fn and_where_with<I>(&mut self, text: &str, params: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let params = params.into_iter().map(Into::into).collect();
        self.core_mut().push_raw_with(true, text, params)?;
        Ok(self)
    }

    // ==================== Comparisons ====================

    /// `<column>=<value>`, or `<column> IS NULL` for null.
    fn where_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_equal(false, column, value.into(), false);
        self
    }

    fn and_where_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_equal(true, column, value.into(), false);
        self
    }

    /// `<column><><value>`, or `<column> IS NOT NULL` for null.
    fn where_not_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_equal(false, column, value.into(), true);
        self
    }

    fn and_where_not_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_equal(true, column, value.into(), true);
        self
    }

    fn where_is_null(&mut self, column: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_is_null(false, column, false);
        self
    }

    fn and_where_is_null(&mut self, column: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_is_null(true, column, false);
        self
    }

    fn where_is_not_null(&mut self, column: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_is_null(false, column, true);
        self
    }

    fn and_where_is_not_null(&mut self, column: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_is_null(true, column, true);
        self
    }

    // ==================== IN lists ====================

    /// `<column> IN (...)`. One value degenerates to [`where_equal`](Query::where_equal);
    /// an empty set is an error.
    fn where_in<I>(&mut self, column: &str, values: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.core_mut().push_in(false, column, values, false)?;
        Ok(self)
    }

    fn and_where_in<I>(&mut self, column: &str, values: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.core_mut().push_in(true, column, values, false)?;
        Ok(self)
    }

    /// `<column> NOT IN (...)`. One value degenerates to
    /// [`where_not_equal`](Query::where_not_equal); an empty set is an error.
    fn where_not_in<I>(&mut self, column: &str, values: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.core_mut().push_in(false, column, values, true)?;
        Ok(self)
    }

    /// Like [`where_not_in`](Query::where_not_in) joined with `AND`, except that an empty
    /// set leaves the query unchanged.
    fn and_where_not_in<I>(&mut self, column: &str, values: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.core_mut().push_in(true, column, values, true)?;
        Ok(self)
    }

    /// `<column> IN (<subquery>)`; the subquery's parameters follow in order.
    fn where_in_query(&mut self, column: &str, subquery: &SelectQuery) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_in_query(false, column, subquery, false);
        self
    }

    fn and_where_in_query(&mut self, column: &str, subquery: &SelectQuery) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_in_query(true, column, subquery, false);
        self
    }

    fn where_not_in_query(&mut self, column: &str, subquery: &SelectQuery) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_in_query(false, column, subquery, true);
        self
    }

    fn and_where_not_in_query(&mut self, column: &str, subquery: &SelectQuery) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_in_query(true, column, subquery, true);
        self
    }

    // ==================== Ranges and search ====================

    /// Inclusive calendar-day range: `column >= start` and `column < end + 1 day`.
    ///
    /// Missing bounds are left out; with neither bound the query is unchanged.
    fn where_between_dates<D: CalendarDay>(
        &mut self,
        column: &str,
        start: Option<D>,
        end: Option<D>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let start = start.map(|d| d.calendar_day());
        let end = end.map(|d| d.calendar_day());
        self.core_mut().push_between_dates(false, column, start, end);
        self
    }

    fn and_where_between_dates<D: CalendarDay>(
        &mut self,
        column: &str,
        start: Option<D>,
        end: Option<D>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let start = start.map(|d| d.calendar_day());
        let end = end.map(|d| d.calendar_day());
        self.core_mut().push_between_dates(true, column, start, end);
        self
    }

    /// Match every word of `phrase` against `columns` and `foreign_columns` with `LIKE`.
    fn where_search_match(
        &mut self,
        phrase: &str,
        method: SearchMethod,
        columns: &[&str],
        foreign_columns: &[ForeignColumn],
    ) -> OrmResult<&mut Self>
    where
        Self: Sized,
    {
        self.core_mut()
            .push_search_match(false, phrase, method, columns, foreign_columns)?;
        Ok(self)
    }

    fn and_where_search_match(
        &mut self,
        phrase: &str,
        method: SearchMethod,
        columns: &[&str],
        foreign_columns: &[ForeignColumn],
    ) -> OrmResult<&mut Self>
    where
        Self: Sized,
    {
        self.core_mut()
            .push_search_match(true, phrase, method, columns, foreign_columns)?;
        Ok(self)
    }

    // ==================== Joins ====================

    /// Join `referenced_table` on `<left>.<foreign_key>=<right>.<referenced_key>`.
    ///
    /// The left side is `table_alias`, else the query alias, else the queried table.
    /// The right side is `referenced_alias`, else `referenced_table`.
    fn join(
        &mut self,
        table_alias: Option<&str>,
        foreign_key: &str,
        referenced_table: &str,
        referenced_alias: Option<&str>,
        referenced_key: &str,
        join_type: JoinType,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().push_join(
            table_alias,
            foreign_key,
            referenced_table,
            referenced_alias,
            referenced_key,
            join_type,
        );
        self
    }

    /// [`join`](Query::join) with the referenced table taken from a record type.
    fn join_record<R: Record>(
        &mut self,
        table_alias: Option<&str>,
        foreign_key: &str,
        referenced_alias: Option<&str>,
        referenced_key: &str,
        join_type: JoinType,
    ) -> OrmResult<&mut Self>
    where
        Self: Sized,
    {
        let handler = ClassHandler::of::<R>()?;
        self.core_mut().push_join(
            table_alias,
            foreign_key,
            handler.table_name(),
            referenced_alias,
            referenced_key,
            join_type,
        );
        Ok(self)
    }

    /// Append hand-written join text whose `?` marks are filled from `params`.
    fn join_raw<I>(&mut self, text: &str, params: I) -> OrmResult<&mut Self>
    where
        Self: Sized,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let params = params.into_iter().map(Into::into).collect();
        self.core_mut().push_join_raw(text, params)?;
        Ok(self)
    }
}

/// Builders whose statement modifies rows (`UPDATE`, `DELETE`).
pub trait ModifyQuery: Query {}

impl ModifyQuery for UpdateQuery {}
impl ModifyQuery for DeleteQuery {}
