//! Clause assembly shared by all query kinds.

use super::{BuildOptions, ForeignColumn, JoinType, Query, SearchMethod, SelectQuery};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::text::{create_like_pattern, placeholder_offsets, render_literal};
use crate::value::Value;
use chrono::{Days, NaiveDate};

/// Table reference, alias, WHERE and JOIN buffers of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCore {
    table: String,
    alias: Option<String>,
    suffix: Option<String>,
    where_sql: String,
    where_params: Vec<Value>,
    join_sql: String,
    join_params: Vec<Value>,
    options: BuildOptions,
}

impl QueryCore {
    pub fn new(table: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            table: table.into(),
            alias: None,
            suffix: None,
            where_sql: String::new(),
            where_params: Vec::new(),
            join_sql: String::new(),
            join_params: Vec::new(),
            options,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn where_sql(&self) -> &str {
        &self.where_sql
    }

    pub fn where_params(&self) -> &[Value] {
        &self.where_params
    }

    pub fn join_sql(&self) -> &str {
        &self.join_sql
    }

    pub fn join_params(&self) -> &[Value] {
        &self.join_params
    }

    pub(crate) fn set_alias(&mut self, alias: &str) {
        let alias = alias.trim();
        self.alias = (!alias.is_empty()).then(|| alias.to_string());
    }

    pub(crate) fn set_suffix(&mut self, text: &str) {
        let text = text.trim();
        self.suffix = (!text.is_empty()).then(|| text.to_string());
    }

    pub(crate) fn set_parameterized(&mut self, parameterized: bool) {
        self.options.parameterized = parameterized;
    }

    pub(crate) fn set_inline_literals(&mut self, inline: bool) {
        self.options.inline_literals = inline;
    }

    pub(crate) fn set_separator(&mut self, separator: &str) {
        self.options.separator = separator.to_string();
    }

    pub(crate) fn set_dialect(&mut self, dialect: Dialect) {
        self.options.dialect = dialect;
    }

    pub(crate) fn validate_table(&self) -> OrmResult<()> {
        if self.table.trim().is_empty() {
            return Err(OrmError::validation("query has no table name"));
        }
        Ok(())
    }

    /// `<table>[ AS <alias>][ <suffix>]`
    pub(crate) fn render_table(&self, out: &mut String) {
        out.push_str(&self.table);
        if let Some(alias) = &self.alias {
            out.push_str(" AS ");
            out.push_str(alias);
        }
        if let Some(suffix) = &self.suffix {
            out.push(' ');
            out.push_str(suffix);
        }
    }

    /// Separator followed by the join text, when there is any.
    pub(crate) fn render_joins(&self, out: &mut String) {
        if !self.join_sql.is_empty() {
            out.push_str(&self.options.separator);
            out.push_str(&self.join_sql);
        }
    }

    /// Separator followed by `WHERE <text>`, when there is any.
    pub(crate) fn render_where(&self, out: &mut String) {
        if !self.where_sql.is_empty() {
            out.push_str(&self.options.separator);
            out.push_str("WHERE ");
            out.push_str(&self.where_sql);
        }
    }

    // ==================== WHERE assembly ====================

    /// Whether an AND-form call must insert `AND` before its text.
    fn needs_and(&self) -> bool {
        match self.where_sql.trim_end().chars().next_back() {
            None => false,
            Some(c) => c != '(',
        }
    }

    fn open_where(&mut self, and: bool) {
        if and && self.needs_and() {
            self.where_sql.push_str(&self.options.separator);
            self.where_sql.push_str("AND ");
        }
    }

    pub(crate) fn push_raw(&mut self, and: bool, text: &str) {
        self.open_where(and);
        self.where_sql.push_str(text);
    }

    pub(crate) fn push_raw_with(
        &mut self,
        and: bool,
        text: &str,
        params: Vec<Value>,
    ) -> OrmResult<()> {
        check_placeholders(text, params.len())?;
        self.open_where(and);
        fill_placeholders(
            &self.options,
            text,
            params,
            &mut self.where_sql,
            &mut self.where_params,
        );
        Ok(())
    }

    pub(crate) fn push_equal(&mut self, and: bool, column: &str, value: Value, negate: bool) {
        self.open_where(and);
        push_column(self.alias.as_deref(), column, &mut self.where_sql);
        if value.is_null() {
            self.where_sql
                .push_str(if negate { " IS NOT NULL" } else { " IS NULL" });
        } else {
            self.where_sql.push_str(if negate { "<>" } else { "=" });
            embed_value(&self.options, value, &mut self.where_sql, &mut self.where_params);
        }
    }

    pub(crate) fn push_is_null(&mut self, and: bool, column: &str, negate: bool) {
        self.push_equal(and, column, Value::Null, negate);
    }

    pub(crate) fn push_in(
        &mut self,
        and: bool,
        column: &str,
        mut values: Vec<Value>,
        negate: bool,
    ) -> OrmResult<()> {
        match values.len() {
            0 if and && negate => Ok(()),
            0 => Err(OrmError::validation(format!(
                "{} on column '{column}' requires at least one value",
                if negate { "NOT IN" } else { "IN" }
            ))),
            1 => {
                let value = values.pop().unwrap_or_default();
                self.push_equal(and, column, value, negate);
                Ok(())
            }
            _ => {
                self.open_where(and);
                push_column(self.alias.as_deref(), column, &mut self.where_sql);
                self.where_sql
                    .push_str(if negate { " NOT IN (" } else { " IN (" });
                for (i, value) in values.into_iter().enumerate() {
                    if i > 0 {
                        self.where_sql.push(',');
                    }
                    embed_value(&self.options, value, &mut self.where_sql, &mut self.where_params);
                }
                self.where_sql.push(')');
                Ok(())
            }
        }
    }

    pub(crate) fn push_in_query(
        &mut self,
        and: bool,
        column: &str,
        subquery: &SelectQuery,
        negate: bool,
    ) {
        self.open_where(and);
        push_column(self.alias.as_deref(), column, &mut self.where_sql);
        self.where_sql
            .push_str(if negate { " NOT IN (" } else { " IN (" });
        self.where_sql.push_str(&subquery.query_string());
        self.where_sql.push(')');
        self.where_params.extend(subquery.query_parameters());
    }

    pub(crate) fn push_between_dates(
        &mut self,
        and: bool,
        column: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) {
        if start.is_none() && end.is_none() {
            return;
        }
        self.open_where(and);
        if let Some(start) = start {
            push_column(self.alias.as_deref(), column, &mut self.where_sql);
            self.where_sql.push_str(">=");
            embed_value(
                &self.options,
                Value::Date(start),
                &mut self.where_sql,
                &mut self.where_params,
            );
        }
        if let Some(end) = end {
            if start.is_some() {
                self.where_sql.push_str(&self.options.separator);
                self.where_sql.push_str("AND ");
            }
            // Saturates at the last representable date.
            let next_day = end.checked_add_days(Days::new(1)).unwrap_or(end);
            push_column(self.alias.as_deref(), column, &mut self.where_sql);
            self.where_sql.push('<');
            embed_value(
                &self.options,
                Value::Date(next_day),
                &mut self.where_sql,
                &mut self.where_params,
            );
        }
    }

    pub(crate) fn push_search_match(
        &mut self,
        and: bool,
        phrase: &str,
        method: SearchMethod,
        columns: &[&str],
        foreign_columns: &[ForeignColumn],
    ) -> OrmResult<()> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return Err(OrmError::validation("search phrase is empty"));
        }
        if columns.is_empty() && foreign_columns.is_empty() {
            return Err(OrmError::validation("search match needs at least one column"));
        }

        let local = self.alias.clone().unwrap_or_else(|| self.table.clone());
        let escape = match self.options.dialect {
            Dialect::Sqlite => " ESCAPE '\\'",
            Dialect::Postgres | Dialect::MySql => "",
        };
        let combinator = match method {
            SearchMethod::AllWords => " AND ",
            SearchMethod::AnyWord => " OR ",
        };

        let mut sql = String::new();
        let mut params = Vec::new();
        if words.len() > 1 {
            sql.push('(');
        }
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                sql.push_str(combinator);
            }
            let pattern = create_like_pattern(word);
            sql.push('(');
            let mut first = true;
            for column in columns {
                if !first {
                    sql.push_str(" OR ");
                }
                first = false;
                push_column(self.alias.as_deref(), column, &mut sql);
                sql.push_str(" LIKE ");
                embed_value(&self.options, Value::Text(pattern.clone()), &mut sql, &mut params);
                sql.push_str(escape);
            }
            for fc in foreign_columns {
                if !first {
                    sql.push_str(" OR ");
                }
                first = false;
                sql.push_str("EXISTS (SELECT * FROM ");
                sql.push_str(&fc.table);
                sql.push_str(" WHERE ");
                sql.push_str(&format!(
                    "{ft}.{rk}={local}.{fk} AND {ft}.{col} LIKE ",
                    ft = fc.table,
                    rk = fc.referenced_key,
                    fk = fc.foreign_key,
                    col = fc.column,
                ));
                embed_value(&self.options, Value::Text(pattern.clone()), &mut sql, &mut params);
                sql.push_str(escape);
                sql.push(')');
            }
            sql.push(')');
        }
        if words.len() > 1 {
            sql.push(')');
        }

        self.open_where(and);
        self.where_sql.push_str(&sql);
        self.where_params.extend(params);
        Ok(())
    }

    // ==================== JOIN assembly ====================

    fn open_join(&mut self) {
        if !self.join_sql.is_empty() {
            self.join_sql.push_str(&self.options.separator);
        }
    }

    pub(crate) fn push_join(
        &mut self,
        table_alias: Option<&str>,
        foreign_key: &str,
        referenced_table: &str,
        referenced_alias: Option<&str>,
        referenced_key: &str,
        join_type: JoinType,
    ) {
        let left = table_alias
            .or(self.alias.as_deref())
            .unwrap_or(&self.table)
            .to_string();
        let right = referenced_alias.unwrap_or(referenced_table);

        self.open_join();
        self.join_sql.push_str(join_type.keyword());
        self.join_sql.push(' ');
        self.join_sql.push_str(referenced_table);
        if let Some(alias) = referenced_alias {
            self.join_sql.push_str(" AS ");
            self.join_sql.push_str(alias);
        }
        self.join_sql.push_str(&format!(
            " ON {left}.{foreign_key}={right}.{referenced_key}"
        ));
    }

    pub(crate) fn push_join_raw(&mut self, text: &str, params: Vec<Value>) -> OrmResult<()> {
        check_placeholders(text, params.len())?;
        self.open_join();
        fill_placeholders(
            &self.options,
            text,
            params,
            &mut self.join_sql,
            &mut self.join_params,
        );
        Ok(())
    }
}

/// Append `column`, prefixed with `alias.` when it is a plain identifier.
pub(crate) fn push_column(alias: Option<&str>, column: &str, out: &mut String) {
    if let Some(alias) = alias {
        let composite = column
            .chars()
            .any(|c| matches!(c, '.' | ',' | '(' | ')') || c.is_whitespace());
        if !composite {
            out.push_str(alias);
            out.push('.');
        }
    }
    out.push_str(column);
}

/// Append a value as inline text or as a `?` placeholder plus parameter.
pub(crate) fn embed_value(
    options: &BuildOptions,
    value: Value,
    out: &mut String,
    params: &mut Vec<Value>,
) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::ServerNow => out.push_str(options.dialect.current_timestamp()),
        value if options.inline_literals && value.is_simple_literal() => {
            out.push_str(&render_literal(&value));
        }
        value if options.parameterized => {
            out.push('?');
            params.push(value);
        }
        value => out.push_str(&render_literal(&value)),
    }
}

pub(crate) fn check_placeholders(text: &str, params: usize) -> OrmResult<()> {
    let marks = placeholder_offsets(text).len();
    if marks != params {
        return Err(OrmError::validation(format!(
            "'{text}' has {marks} placeholder(s) but {params} parameter(s) were given"
        )));
    }
    Ok(())
}

/// Copy `text`, replacing each placeholder by its parameter under the embedding rules.
pub(crate) fn fill_placeholders(
    options: &BuildOptions,
    text: &str,
    params: Vec<Value>,
    out: &mut String,
    out_params: &mut Vec<Value>,
) {
    let mut copied = 0;
    for (mark, value) in placeholder_offsets(text).into_iter().zip(params) {
        out.push_str(&text[copied..mark]);
        embed_value(options, value, out, out_params);
        copied = mark + 1;
    }
    out.push_str(&text[copied..]);
}
