//! Generic result rows for ad-hoc queries

use crate::{Error, Result};
use rusqlite::types::{FromSql, Value, ValueRef};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A result row: column names in select order, each paired with its value.
///
/// Returned by [`Database::query`](crate::Database::query) and friends when the
/// caller doesn't map rows into a typed record.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Capture the current row of a rusqlite cursor
    pub(crate) fn from_sqlite(columns: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(row.get::<_, Value>(idx)?);
        }
        Ok(Self {
            columns: columns.to_vec(),
            values,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value of a column, if present
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Typed value of a column
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| Error::NotFound(format!("column {column}")))?;
        T::column_result(ValueRef::from(value)).map_err(|e| {
            Error::Storage(rusqlite::Error::FromSqlConversionFailure(
                self.columns.iter().position(|c| c == column).unwrap_or(0),
                value.data_type(),
                Box::new(e),
            ))
        })
    }

    /// Iterate `(column, value)` pairs in select order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            match value {
                Value::Null => map.serialize_entry(column, &())?,
                Value::Integer(i) => map.serialize_entry(column, i)?,
                Value::Real(f) => map.serialize_entry(column, f)?,
                Value::Text(s) => map.serialize_entry(column, s)?,
                Value::Blob(b) => map.serialize_entry(column, b)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".into(), "email".into(), "bio".into()],
            vec![Value::Integer(1), Value::Text("a@x.com".into()), Value::Null],
        )
    }

    #[test]
    fn test_typed_access_by_name() {
        let row = sample();
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert_eq!(row.get::<String>("email").unwrap(), "a@x.com");
        assert_eq!(row.get::<Option<String>>("bio").unwrap(), None);
    }

    #[test]
    fn test_missing_column_and_bad_type() {
        let row = sample();
        assert!(matches!(row.get::<i64>("nope"), Err(Error::NotFound(_))));
        assert!(matches!(row.get::<i64>("email"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"id":1,"email":"a@x.com","bio":null}"#);
    }
}
