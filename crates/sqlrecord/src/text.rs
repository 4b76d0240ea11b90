//! String helpers shared by the query builder and the record mapper.

use crate::value::Value;
use std::fmt::Write;

/// Build a `LIKE` pattern that matches `text` anywhere in a column.
///
/// The result is wrapped in `%`, every run of whitespace becomes a single `%`, and the
/// characters `\`, `%` and `_` are escaped with a backslash. Quotes are left alone; the
/// pattern is expected to be bound as a parameter or quoted by the caller.
pub fn create_like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    let mut in_space = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                pattern.push('%');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Quote a string as an SQL literal, doubling embedded single quotes.
pub fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Render a value as inline SQL text.
///
/// Numbers and booleans are rendered bare, everything else as a quoted literal.
/// [`Value::ServerNow`] renders as the standard `CURRENT_TIMESTAMP`; the query builder
/// substitutes the dialect's own expression before reaching this point.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => v.to_string(),
        Value::Float(v) => quote_literal(&v.to_string()),
        Value::Decimal(v) => v.to_string(),
        Value::Char(c) => quote_literal(c.encode_utf8(&mut [0; 4])),
        Value::Text(s) | Value::Enum(s) => quote_literal(s),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
        Value::Date(d) => quote_literal(&d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => quote_literal(&t.format("%H:%M:%S%.f").to_string()),
        Value::DateTime(dt) => quote_literal(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::DateTimeUtc(dt) => {
            quote_literal(&dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
        }
        Value::Uuid(u) => quote_literal(&u.to_string()),
        Value::Json(j) => quote_literal(&j.to_string()),
        Value::ServerNow => "CURRENT_TIMESTAMP".to_string(),
    }
}

/// Byte offsets of the `?` placeholders in `sql`.
///
/// Question marks inside single-quoted strings, double-quoted identifiers, `--` and
/// `/* */` comments and `$tag$` dollar-quoted bodies are text, not placeholders.
pub fn placeholder_offsets(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let end = bytes.len();
    let mut marks = Vec::new();
    let mut i = 0;
    while i < end {
        i = match bytes[i] {
            b'?' => {
                marks.push(i);
                i + 1
            }
            // A doubled quote closes and reopens, which skips the same text.
            quote @ (b'\'' | b'"') => bytes[i + 1..]
                .iter()
                .position(|&b| b == quote)
                .map_or(end, |p| i + p + 2),
            b'-' if bytes.get(i + 1) == Some(&b'-') => bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(end, |p| i + p + 1),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                sql[i + 2..].find("*/").map_or(end, |p| i + 2 + p + 2)
            }
            b'$' => match dollar_tag(&sql[i..]) {
                Some(tag) => {
                    let body = i + tag.len();
                    sql[body..].find(tag).map_or(end, |p| body + p + tag.len())
                }
                None => i + 1,
            },
            _ => i + 1,
        };
    }
    marks
}

/// The `$$` or `$name$` opening a dollar-quoted body at the start of `rest`.
fn dollar_tag(rest: &str) -> Option<&str> {
    let name = &rest[1..];
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let len = name.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
    name[len..].starts_with('$').then(|| &rest[..len + 2])
}

/// Encode `key=value` pairs into one string, one pair per line.
///
/// `\`, `=` and line breaks inside keys and values are backslash-escaped so that
/// [`decode_pairs`] restores them exactly.
pub fn encode_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        escape_into(&mut out, key);
        out.push('=');
        escape_into(&mut out, value);
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

/// Decode a string produced by [`encode_pairs`].
///
/// Empty lines are ignored. A line without an unescaped `=` is an error.
pub fn decode_pairs(encoded: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for (line_no, line) in encoded.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut key = String::new();
        let mut value = String::new();
        let mut seen_separator = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            let target = if seen_separator { &mut value } else { &mut key };
            match c {
                '\\' => match chars.next() {
                    Some('n') => target.push('\n'),
                    Some('r') => target.push('\r'),
                    Some(other) => target.push(other),
                    None => return Err(format!("line {}: dangling escape", line_no + 1)),
                },
                '=' if !seen_separator => seen_separator = true,
                c => target.push(c),
            }
        }
        if !seen_separator {
            return Err(format!("line {}: missing '=' separator", line_no + 1));
        }
        pairs.push((key, value));
    }
    Ok(pairs)
}
