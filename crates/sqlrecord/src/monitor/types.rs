use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// Transaction control (`BEGIN`, `COMMIT`, savepoints, ...)
    Transaction,
    /// DDL and anything unrecognized
    Other,
}

impl QueryType {
    /// Detect query type from SQL text.
    ///
    /// For CTEs (`WITH ...`), looks past the CTE definitions to the statement keyword.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = strip_sql_prefix(sql);
        if starts_with_keyword(trimmed, "WITH") {
            return Self::detect_cte_dml(trimmed);
        }
        Self::from_keyword(trimmed).unwrap_or(QueryType::Other)
    }

    fn from_keyword(s: &str) -> Option<Self> {
        const KEYWORDS: [(&str, QueryType); 12] = [
            ("SELECT", QueryType::Select),
            ("INSERT", QueryType::Insert),
            ("UPDATE", QueryType::Update),
            ("DELETE", QueryType::Delete),
            ("BEGIN", QueryType::Transaction),
            ("START", QueryType::Transaction),
            ("SET TRANSACTION", QueryType::Transaction),
            ("COMMIT", QueryType::Transaction),
            ("ROLLBACK", QueryType::Transaction),
            ("SAVEPOINT", QueryType::Transaction),
            ("RELEASE", QueryType::Transaction),
            ("END", QueryType::Transaction),
        ];
        KEYWORDS
            .iter()
            .find(|(keyword, _)| starts_with_keyword(s, keyword))
            .map(|&(_, query_type)| query_type)
    }

    /// The statement after the last top-level parenthesized CTE body decides the type.
    fn detect_cte_dml(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut depth: i32 = 0;
        let mut last_top_level = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        last_top_level = i + 1;
                    }
                }
                b'\'' => {
                    i += 1;
                    while i < bytes.len() {
                        if bytes[i] == b'\'' {
                            if bytes.get(i + 1) == Some(&b'\'') {
                                i += 1;
                            } else {
                                break;
                            }
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        match Self::from_keyword(sql[last_top_level..].trim_start()) {
            Some(QueryType::Insert) => QueryType::Insert,
            Some(QueryType::Update) => QueryType::Update,
            Some(QueryType::Delete) => QueryType::Delete,
            _ => QueryType::Select,
        }
    }
}

/// Skip whitespace, comments and opening parentheses in front of the first keyword.
fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            match rest.find('\n') {
                Some(pos) => s = &rest[pos + 1..],
                None => return "",
            }
        } else if let Some(rest) = s.strip_prefix("/*") {
            match rest.find("*/") {
                Some(pos) => s = &rest[pos + 2..],
                None => return "",
            }
        } else if let Some(rest) = s.strip_prefix('(') {
            s = rest;
        }
        if s.len() == before.len() {
            return s;
        }
    }
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(..keyword.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(keyword) => s[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_')),
        _ => false,
    }
}

/// Context information about the statement being executed.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL text as built, with `?` placeholders.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<Value>,
    /// Detected statement type.
    pub query_type: QueryType,
    /// Optional operation name, e.g. `Person.insert`.
    pub tag: Option<String>,
    /// Optional structured fields for observability (low-cardinality).
    pub fields: BTreeMap<String, String>,
}

impl QueryContext {
    pub fn new(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.to_vec(),
            query_type: QueryType::from_sql(sql),
            tag: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Add a tag to identify this statement.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add a structured field (low-cardinality).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Parameters rendered for log output, e.g. `[30, 'NYC']`.
    pub fn params_display(&self) -> String {
        let rendered: Vec<String> = self.params.iter().map(crate::text::render_literal).collect();
        format!("[{}]", rendered.join(", "))
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement, for monitoring purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Query returned rows.
    Rows(usize),
    /// Statement affected rows.
    Affected(u64),
    /// Statement without a row count (transaction control, DDL batches).
    Done,
    /// Statement failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating the message to avoid monitoring data explosion.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Done => f.write_str("ok"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observer of statement execution.
///
/// Implement this trait to collect metrics, log queries, or integrate with observability
/// systems. Register monitors with [`Database::with_monitor`](crate::Database::with_monitor).
pub trait QueryMonitor: Send + Sync {
    /// Called before a statement is executed.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after a statement completes (success or failure).
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called when a statement took longer than the configured slow-query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
