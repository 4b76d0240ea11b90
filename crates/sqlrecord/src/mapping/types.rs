//! Field types, storage categories and the value conversions behind them.

use crate::text::{decode_pairs, encode_pairs};
use crate::value::{ConversionError, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Declared type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Char,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Uuid,
    Json,
    Enum,
    Properties,
    LocalizedString,
}

/// Normalized storage category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Decimal,
    Boolean,
    Byte,
    Char,
    Integer,
    Float,
    Binary,
    DateTime,
    Enum,
    String,
}

impl FieldType {
    /// Storage category; anything without a dedicated category is stored as a string.
    pub const fn sql_type(self) -> SqlType {
        match self {
            FieldType::Decimal => SqlType::Decimal,
            FieldType::Bool => SqlType::Boolean,
            FieldType::Byte => SqlType::Byte,
            FieldType::Char => SqlType::Char,
            FieldType::Short | FieldType::Int | FieldType::Long => SqlType::Integer,
            FieldType::Float | FieldType::Double => SqlType::Float,
            FieldType::Bytes => SqlType::Binary,
            FieldType::Date | FieldType::Time | FieldType::DateTime | FieldType::DateTimeUtc => {
                SqlType::DateTime
            }
            FieldType::Enum => SqlType::Enum,
            FieldType::String
            | FieldType::Uuid
            | FieldType::Json
            | FieldType::Properties
            | FieldType::LocalizedString => SqlType::String,
        }
    }

    /// Column type used in derived `CREATE TABLE` statements.
    pub const fn ddl_type(self) -> &'static str {
        match self {
            FieldType::Bool => "BOOLEAN",
            FieldType::Byte | FieldType::Short => "SMALLINT",
            FieldType::Int => "INTEGER",
            FieldType::Long => "BIGINT",
            FieldType::Float => "REAL",
            FieldType::Double => "DOUBLE PRECISION",
            FieldType::Decimal => "DECIMAL",
            FieldType::Char => "CHAR(1)",
            FieldType::Bytes => "BYTEA",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "TIMESTAMP",
            FieldType::DateTimeUtc => "TIMESTAMP WITH TIME ZONE",
            FieldType::Uuid => "UUID",
            FieldType::Json => "JSON",
            FieldType::Enum => "VARCHAR(64)",
            FieldType::String | FieldType::Properties | FieldType::LocalizedString => "TEXT",
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Byte | FieldType::Short | FieldType::Int | FieldType::Long
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Char => "char",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::DateTimeUtc => "datetime-utc",
            FieldType::Uuid => "uuid",
            FieldType::Json => "json",
            FieldType::Enum => "enum",
            FieldType::Properties => "properties",
            FieldType::LocalizedString => "localized-string",
        }
    }

    /// Normalize a value read from a database into the shape this field type expects.
    ///
    /// Drivers report columns in their own terms (SQLite booleans as integers, enums as
    /// text, decimals for numeric aggregates, ...). Null passes through untouched.
    pub fn coerce(self, value: Value) -> Result<Value, ConversionError> {
        let expected = self.name();
        let fail = |value: &Value| ConversionError::unexpected(expected, value);
        let bad = |value: &Value, detail: String| ConversionError::invalid(expected, value, detail);

        let coerced = match (self, value) {
            (_, Value::Null) => Value::Null,
            (_, value @ Value::ServerNow) => return Err(fail(&value)),

            (FieldType::Bool, value @ Value::Bool(_)) => value,
            (FieldType::Bool, Value::Int(v)) => Value::Bool(v != 0),
            (FieldType::Bool, value @ Value::Text(_)) => {
                match value.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
                    Some("t" | "true" | "1" | "y" | "yes") => Value::Bool(true),
                    Some("f" | "false" | "0" | "n" | "no") => Value::Bool(false),
                    _ => return Err(fail(&value)),
                }
            }

            (ft, value @ Value::Int(_)) if ft.is_integer() => value,
            (ft, Value::Bool(b)) if ft.is_integer() => Value::Int(i64::from(b)),
            (ft, value @ Value::Decimal(d)) if ft.is_integer() => {
                if d.fract().is_zero() {
                    d.to_i64().map(Value::Int).ok_or_else(|| bad(&value, "out of range".into()))?
                } else {
                    return Err(bad(&value, "has a fractional part".into()));
                }
            }
            (ft, value @ Value::Float(f)) if ft.is_integer() => {
                if f.fract() != 0.0 || !f.is_finite() {
                    return Err(bad(&value, "has a fractional part".into()));
                }
                f.to_i64().map(Value::Int).ok_or_else(|| bad(&value, "out of range".into()))?
            }
            (ft, Value::Text(s)) if ft.is_integer() => match s.trim().parse::<i64>() {
                Ok(v) => Value::Int(v),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },

            (FieldType::Float | FieldType::Double, value @ Value::Float(_)) => value,
            (FieldType::Float | FieldType::Double, Value::Int(v)) => Value::Float(v as f64),
            (FieldType::Float | FieldType::Double, value @ Value::Decimal(d)) => d
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| bad(&value, "out of range".into()))?,
            (FieldType::Float | FieldType::Double, Value::Text(s)) => {
                match s.trim().parse::<f64>() {
                    Ok(v) => Value::Float(v),
                    Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
                }
            }

            (FieldType::Decimal, value @ Value::Decimal(_)) => value,
            (FieldType::Decimal, Value::Int(v)) => Value::Decimal(Decimal::from(v)),
            (FieldType::Decimal, value @ Value::Float(f)) => Decimal::from_f64(f)
                .map(Value::Decimal)
                .ok_or_else(|| bad(&value, "not representable".into()))?,
            (FieldType::Decimal, Value::Text(s)) => match s.trim().parse::<Decimal>() {
                Ok(d) => Value::Decimal(d),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },

            (FieldType::Char, value @ Value::Char(_)) => value,
            (FieldType::Char, Value::Text(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(bad(&Value::Text(s), "expected exactly one character".into())),
                }
            }

            (FieldType::String, value @ Value::Text(_)) => value,
            (FieldType::String, Value::Enum(s)) => Value::Text(s),
            (FieldType::String, Value::Char(c)) => Value::Text(c.to_string()),
            (FieldType::String, Value::Uuid(u)) => Value::Text(u.to_string()),
            (FieldType::String, Value::Json(j)) => Value::Text(j.to_string()),
            (FieldType::String, Value::Int(v)) => Value::Text(v.to_string()),
            (FieldType::String, Value::Decimal(d)) => Value::Text(d.to_string()),

            (FieldType::Bytes, value @ Value::Bytes(_)) => value,
            (FieldType::Bytes, Value::Text(s)) => Value::Bytes(s.into_bytes()),

            (FieldType::Date, value @ Value::Date(_)) => value,
            (FieldType::Date, Value::DateTime(dt)) => Value::Date(dt.date()),
            (FieldType::Date, Value::DateTimeUtc(dt)) => Value::Date(dt.date_naive()),
            (FieldType::Date, Value::Text(s)) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => Value::Date(d),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },

            (FieldType::Time, value @ Value::Time(_)) => value,
            (FieldType::Time, Value::DateTime(dt)) => Value::Time(dt.time()),
            (FieldType::Time, Value::Text(s)) => match NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f") {
                Ok(t) => Value::Time(t),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },

            (FieldType::DateTime, value @ Value::DateTime(_)) => value,
            (FieldType::DateTime, Value::DateTimeUtc(dt)) => Value::DateTime(dt.naive_utc()),
            (FieldType::DateTime, Value::Date(d)) => Value::DateTime(d.and_time(NaiveTime::MIN)),
            (FieldType::DateTime, Value::Text(s)) => match parse_naive_datetime(&s) {
                Some(dt) => Value::DateTime(dt),
                None => return Err(bad(&Value::Text(s), "not a timestamp".into())),
            },

            (FieldType::DateTimeUtc, value @ Value::DateTimeUtc(_)) => value,
            (FieldType::DateTimeUtc, Value::DateTime(dt)) => Value::DateTimeUtc(dt.and_utc()),
            (FieldType::DateTimeUtc, Value::Text(s)) => {
                match DateTime::parse_from_rfc3339(s.trim()) {
                    Ok(dt) => Value::DateTimeUtc(dt.with_timezone(&Utc)),
                    Err(_) => match parse_naive_datetime(&s) {
                        Some(dt) => Value::DateTimeUtc(dt.and_utc()),
                        None => return Err(bad(&Value::Text(s), "not a timestamp".into())),
                    },
                }
            }

            (FieldType::Uuid, value @ Value::Uuid(_)) => value,
            (FieldType::Uuid, Value::Text(s)) => match Uuid::parse_str(s.trim()) {
                Ok(u) => Value::Uuid(u),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },
            (FieldType::Uuid, Value::Bytes(b)) => match Uuid::from_slice(&b) {
                Ok(u) => Value::Uuid(u),
                Err(e) => return Err(bad(&Value::Bytes(b), e.to_string())),
            },

            (FieldType::Json, value @ Value::Json(_)) => value,
            (FieldType::Json, Value::Text(s)) => match serde_json::from_str(&s) {
                Ok(j) => Value::Json(j),
                Err(e) => return Err(bad(&Value::Text(s), e.to_string())),
            },

            (FieldType::Enum, value @ Value::Enum(_)) => value,
            (FieldType::Enum, Value::Text(s)) => Value::Enum(s),

            (FieldType::Properties | FieldType::LocalizedString, value @ Value::Text(_)) => value,

            (_, value) => return Err(fail(&value)),
        };
        Ok(coerced)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Conversion between a Rust field type and [`Value`].
///
/// Implemented for the scalar types the mapper understands, for [`Properties`],
/// [`LocalizedString`], [`ServerTime`] and `Option<T>`, and by `#[derive(RecordEnum)]`.
pub trait FieldValue: Sized {
    const FIELD_TYPE: FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;

    /// Store `value` into an existing field.
    ///
    /// The default replaces the field. Types that hand out shared handles override this to
    /// update the existing instance instead.
    fn assign_value(&mut self, value: Value) -> Result<(), ConversionError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

macro_rules! integer_field {
    ($($ty:ty => $ft:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::$ft;

                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match &value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::invalid(stringify!($ty), &value, "out of range")
                        }),
                        other => Err(ConversionError::unexpected(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

integer_field! {
    i8 => Byte,
    u8 => Byte,
    i16 => Short,
    i32 => Int,
    u16 => Int,
    i64 => Long,
    u32 => Long,
}

macro_rules! simple_field {
    ($($ty:ty => $ft:ident / $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::$ft;

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(ConversionError::unexpected(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

simple_field! {
    bool => Bool / Bool,
    f64 => Double / Float,
    Decimal => Decimal / Decimal,
    char => Char / Char,
    Vec<u8> => Bytes / Bytes,
    NaiveDate => Date / Date,
    NaiveTime => Time / Time,
    NaiveDateTime => DateTime / DateTime,
    DateTime<Utc> => DateTimeUtc / DateTimeUtc,
    Uuid => Uuid / Uuid,
    serde_json::Value => Json / Json,
}

impl FieldValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(ConversionError::unexpected("f32", &other)),
        }
    }
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::String;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) | Value::Enum(s) => Ok(s),
            other => Err(ConversionError::unexpected("String", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }

    fn assign_value(&mut self, value: Value) -> Result<(), ConversionError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(current) => current.assign_value(value),
            None => {
                *self = Some(T::from_value(value)?);
                Ok(())
            }
        }
    }
}

// ─── Properties ─────────────────────────────────────────────────────────────

/// Free-text key/value map stored in a single text column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn encode(&self) -> String {
        encode_pairs(self.iter())
    }

    pub fn decode(encoded: &str) -> Result<Self, String> {
        decode_pairs(encoded).map(|pairs| Self(pairs.into_iter().collect()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl FieldValue for Properties {
    const FIELD_TYPE: FieldType = FieldType::Properties;

    fn to_value(&self) -> Value {
        Value::Text(self.encode())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match &value {
            Value::Text(s) => {
                Self::decode(s).map_err(|e| ConversionError::invalid("Properties", &value, e))
            }
            other => Err(ConversionError::unexpected("Properties", other)),
        }
    }
}

impl From<Properties> for Value {
    fn from(p: Properties) -> Self {
        p.to_value()
    }
}

// ─── LocalizedString ────────────────────────────────────────────────────────

/// Text in several locales, stored in a single text column.
///
/// Clones share storage: when a record field holding a `LocalizedString` is loaded or
/// refreshed, the existing instance is updated in place, so every clone handed out earlier
/// sees the new text.
#[derive(Clone, Default)]
pub struct LocalizedString {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl LocalizedString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.set(locale, text);
        self
    }

    pub fn get(&self, locale: &str) -> Option<String> {
        self.read().get(locale).cloned()
    }

    pub fn set(&self, locale: impl Into<String>, text: impl Into<String>) {
        self.write().insert(locale.into(), text.into());
    }

    pub fn remove(&self, locale: &str) -> Option<String> {
        self.write().remove(locale)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn locales(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of all translations.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Whether both handles point at the same storage.
    pub fn shares_storage_with(&self, other: &LocalizedString) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn encode(&self) -> String {
        let map = self.read();
        encode_pairs(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Replace all translations with those in `encoded`, keeping this instance.
    pub fn decode_into(&self, encoded: &str) -> Result<(), String> {
        let pairs = decode_pairs(encoded)?;
        let mut map = self.write();
        map.clear();
        map.extend(pairs);
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LocalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalizedString").field(&*self.read()).finish()
    }
}

impl PartialEq for LocalizedString {
    fn eq(&self, other: &Self) -> bool {
        self.shares_storage_with(other) || *self.read() == *other.read()
    }
}

impl FieldValue for LocalizedString {
    const FIELD_TYPE: FieldType = FieldType::LocalizedString;

    fn to_value(&self) -> Value {
        Value::Text(self.encode())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let fresh = Self::new();
        fresh.assign_encoded(value)?;
        Ok(fresh)
    }

    fn assign_value(&mut self, value: Value) -> Result<(), ConversionError> {
        self.assign_encoded(value)
    }
}

impl LocalizedString {
    fn assign_encoded(&self, value: Value) -> Result<(), ConversionError> {
        match &value {
            Value::Text(s) => self
                .decode_into(s)
                .map_err(|e| ConversionError::invalid("LocalizedString", &value, e)),
            other => Err(ConversionError::unexpected("LocalizedString", other)),
        }
    }
}

impl From<LocalizedString> for Value {
    fn from(s: LocalizedString) -> Self {
        s.to_value()
    }
}

// ─── ServerTime ─────────────────────────────────────────────────────────────

/// A value the database may compute.
///
/// `Now` is written as the dialect's current-timestamp expression; after an insert or
/// update the engine reads the stored value back as `Literal`. The default is `Now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerTime<T> {
    Literal(T),
    #[default]
    Now,
}

impl<T> ServerTime<T> {
    pub fn is_now(&self) -> bool {
        matches!(self, ServerTime::Now)
    }

    pub fn literal(&self) -> Option<&T> {
        match self {
            ServerTime::Literal(v) => Some(v),
            ServerTime::Now => None,
        }
    }

    pub fn into_literal(self) -> Option<T> {
        match self {
            ServerTime::Literal(v) => Some(v),
            ServerTime::Now => None,
        }
    }
}

impl<T> From<T> for ServerTime<T> {
    fn from(v: T) -> Self {
        ServerTime::Literal(v)
    }
}

impl<T: FieldValue> FieldValue for ServerTime<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn to_value(&self) -> Value {
        match self {
            ServerTime::Literal(v) => v.to_value(),
            ServerTime::Now => Value::ServerNow,
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::ServerNow => Ok(ServerTime::Now),
            value => T::from_value(value).map(ServerTime::Literal),
        }
    }
}

impl<T: FieldValue> From<ServerTime<T>> for Value {
    fn from(v: ServerTime<T>) -> Self {
        v.to_value()
    }
}
