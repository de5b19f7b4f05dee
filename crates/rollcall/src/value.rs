//! Dynamically typed bind values.
//!
//! Form input arrives as text, while the columns it targets are integers, dates or
//! booleans. [`Value`] binds itself according to the parameter type the server
//! inferred for its placeholder, so `Value::Text("42")` compared against an `int8`
//! column is sent as the integer `42`.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

/// A [`Value`] could not be encoded as the parameter type the server inferred.
///
/// Returned from [`ToSql::to_sql`] so the failure can be told apart from server
/// errors once the driver wraps it; see [`DbError::Bind`](crate::DbError::Bind).
#[derive(Debug)]
pub struct BindError {
    message: String,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for BindError {}

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Text(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in bind errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn is_text(ty: &Type) -> bool {
    match *ty {
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => true,
        ref ty if ty.name() == "citext" => true,
        _ => false,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} value to a parameter of type {}", value.kind(), ty).into()
}

fn bind_int(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        ref ty if is_text(ty) => i.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch(&Value::Int(i), ty)),
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        ref ty if is_text(ty) => s.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            let i: i64 = s
                .trim()
                .parse()
                .map_err(|_| format!("'{s}' is not an integer"))?;
            bind_int(i, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => {
            let f: f64 = s
                .trim()
                .parse()
                .map_err(|_| format!("'{s}' is not a number"))?;
            bind_float(f, ty, out)
        }
        Type::BOOL => parse_bool(s)
            .ok_or_else(|| format!("'{s}' is not a boolean"))?
            .to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| format!("'{s}' is not a date"))?
            .to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)
            .ok_or_else(|| format!("'{s}' is not a timestamp"))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamp(s)
            .ok_or_else(|| format!("'{s}' is not a timestamp"))?
            .and_utc()
            .to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        _ => Err(mismatch(&Value::Text(s.to_string()), ty)),
    }
}

fn bind_float(f: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        ref ty if is_text(ty) => f.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch(&Value::Float(f), ty)),
    }
}

impl Value {
    fn encode(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => bind_int(i64::from(*b), ty, out),
                ref ty if is_text(ty) => b.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Int(i) => bind_int(*i, ty, out),
            Value::Float(f) => bind_float(*f, ty, out),
            Value::Text(s) => bind_text(s, ty, out),
            Value::Date(d) => match *ty {
                Type::DATE => d.to_sql(ty, out),
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out),
                ref ty if is_text(ty) => self.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.to_sql(ty, out),
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                ref ty if is_text(ty) => self.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                ref ty if is_text(ty) => v.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        self.encode(ty, out).map_err(|cause| {
            Box::new(BindError {
                message: format!("cannot bind {} '{self}' to {ty}: {cause}", self.kind()),
            }) as BoxError
        })
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert a column [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(format!("expected int, got {}", other.kind())),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let i = i64::from_value(value)?;
        i32::try_from(i).map_err(|_| format!("{i} does not fit in i32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(format!("expected float, got {}", other.kind())),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(format!("expected bool, got {}", other.kind())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(format!("expected text, got {}", other.kind())),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(ts.date()),
            other => Err(format!("expected date, got {}", other.kind())),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            other => Err(format!("expected timestamp, got {}", other.kind())),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        NaiveDateTime::from_value(value).map(|ts| ts.and_utc())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            other => Err(format!("expected json, got {}", other.kind())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, ty: &Type) -> Result<Vec<u8>, BoxError> {
        let mut out = BytesMut::new();
        match value.to_sql(ty, &mut out)? {
            IsNull::Yes => Ok(Vec::new()),
            IsNull::No => Ok(out.to_vec()),
        }
    }

    #[test]
    fn text_binds_to_integer_columns() {
        let bytes = encode(&Value::from("42"), &Type::INT8).unwrap();
        assert_eq!(bytes, 42i64.to_be_bytes().to_vec());

        let bytes = encode(&Value::from(" 7 "), &Type::INT4).unwrap();
        assert_eq!(bytes, 7i32.to_be_bytes().to_vec());
    }

    #[test]
    fn text_that_is_not_a_number_fails_for_integer_columns() {
        let err = encode(&Value::from("abc"), &Type::INT4).unwrap_err();
        let bind = err.downcast_ref::<BindError>().expect("bind error");
        assert!(bind.to_string().contains("'abc'"), "{bind}");
        assert!(bind.to_string().contains("int4"), "{bind}");
    }

    #[test]
    fn int_out_of_range_for_int2_fails() {
        assert!(encode(&Value::Int(70_000), &Type::INT2).is_err());
    }

    #[test]
    fn int_binds_to_text_columns() {
        let bytes = encode(&Value::Int(15), &Type::TEXT).unwrap();
        assert_eq!(bytes, b"15".to_vec());
    }

    #[test]
    fn null_binds_anywhere() {
        let mut out = BytesMut::new();
        let is_null = Value::Null.to_sql(&Type::DATE, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }

    #[test]
    fn text_binds_to_bool_and_date() {
        assert_eq!(encode(&Value::from("on"), &Type::BOOL).unwrap(), vec![1]);
        assert!(encode(&Value::from("2024-02-30"), &Type::DATE).is_err());
        assert!(encode(&Value::from("2024-02-29"), &Type::DATE).is_ok());
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from(3i32), Value::Int(3));
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn display_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-01-05");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(-4).to_string(), "-4");
    }

    #[test]
    fn from_value_option_and_mismatch() {
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(&Value::Int(9)).unwrap(), Some(9));
        assert!(String::from_value(&Value::Int(1)).is_err());
        assert_eq!(f64::from_value(&Value::Int(2)).unwrap(), 2.0);
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(1), Value::Null, Value::from("x")])
            .unwrap();
        assert_eq!(json, r#"[1,null,"x"]"#);
    }
}
