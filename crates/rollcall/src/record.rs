//! Result rows.

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// One result row: ordered column names with their decoded values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Decode a driver row column by column.
    pub fn from_pg_row(row: &Row) -> DbResult<Self> {
        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            values.push(decode_column(row, idx, column.name(), column.type_())?);
            columns.push(column.name().to_string());
        }
        Ok(Self { columns, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of `column`. With duplicate names (joins) the rightmost column wins.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed access. A missing column or a type mismatch is a [`DbError::Decode`].
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|message| DbError::decode(column, message))
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Trait for converting a [`Record`] into a Rust struct.
///
/// ```ignore
/// struct Student {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRecord for Student {
///     fn from_record(record: &Record) -> DbResult<Self> {
///         Ok(Self {
///             id: record.try_get("id")?,
///             name: record.try_get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> DbResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(record.clone())
    }
}

fn get_opt<'a, T>(row: &'a Row, idx: usize, name: &str) -> DbResult<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| DbError::decode(name, e.to_string()))
}

fn decode_column(row: &Row, idx: usize, name: &str, ty: &Type) -> DbResult<Value> {
    let value = match *ty {
        Type::BOOL => get_opt::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get_opt::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get_opt::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get_opt::<i64>(row, idx, name)?.map(Value::Int),
        Type::OID => get_opt::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get_opt::<f32>(row, idx, name)?.map(Value::from),
        Type::FLOAT8 => get_opt::<f64>(row, idx, name)?.map(Value::Float),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get_opt::<String>(row, idx, name)?.map(Value::Text)
        }
        Type::DATE => get_opt::<chrono::NaiveDate>(row, idx, name)?.map(Value::Date),
        Type::TIMESTAMP => get_opt::<chrono::NaiveDateTime>(row, idx, name)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get_opt::<chrono::DateTime<chrono::Utc>>(row, idx, name)?
            .map(|ts| Value::Timestamp(ts.naive_utc())),
        Type::JSON | Type::JSONB => get_opt::<serde_json::Value>(row, idx, name)?.map(Value::Json),
        Type::UUID => get_opt::<uuid::Uuid>(row, idx, name)?.map(|u| Value::Text(u.to_string())),
        ref other if other.name() == "citext" => get_opt::<String>(row, idx, name)?.map(Value::Text),
        ref other => {
            return Err(DbError::decode(
                name,
                format!("unsupported column type {other}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
