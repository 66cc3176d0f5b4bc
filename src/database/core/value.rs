//! SQL values and result rows
//!
//! [`SqlValue`] is the single scalar model used for bound parameters, column
//! defaults and the cells of a [`Row`] returned by a query.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::database::schema::Location;
use crate::error::{Result, SchemaError};

/// Text layout used for timestamps, matching SQLite's `CURRENT_TIMESTAMP`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text layout used for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A scalar SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the value's kind, used in mapping error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Render the value as a SQL literal (used for DDL defaults only)
    ///
    /// Text is wrapped in single quotes with embedded quotes doubled, blobs use
    /// the `X'..'` hex form understood by SQLite and MySQL.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "TRUE".to_string(),
            SqlValue::Bool(false) => "FALSE".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => {
                if v.is_finite() {
                    format!("{:?}", v)
                } else {
                    "NULL".to_string()
                }
            }
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                format!("X'{}'", hex)
            }
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Real(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Real(v as f64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Text(v.hyphenated().to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Text(v.format(TIMESTAMP_FORMAT).to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Text(v.format(DATE_FORMAT).to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// One result row: column names paired with their values, in select order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value of a column, if the row has it
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Generic column-name to value mapping
    pub fn into_map(self) -> BTreeMap<String, SqlValue> {
        self.columns.into_iter().zip(self.values).collect()
    }

    fn require(&self, column: &str) -> Result<&SqlValue> {
        self.get(column)
            .ok_or_else(|| SchemaError::mapping(format!("column '{}' is missing from row", column)))
    }

    fn mismatch(column: &str, expected: &str, found: &SqlValue) -> SchemaError {
        SchemaError::mapping(format!(
            "column '{}': expected {}, found {}",
            column,
            expected,
            found.kind_name()
        ))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            SqlValue::Integer(v) => Ok(*v),
            other => Err(Self::mismatch(column, "integer", other)),
        }
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            _ => self.get_i64(column).map(Some),
        }
    }

    /// Accepts integers as well as reals, since SQLite stores whole decimals as integers
    pub fn get_f64(&self, column: &str) -> Result<f64> {
        match self.require(column)? {
            SqlValue::Real(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(*v as f64),
            other => Err(Self::mismatch(column, "number", other)),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<String> {
        match self.require(column)? {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            _ => self.get_string(column).map(Some),
        }
    }

    /// Booleans come back from SQLite as 0/1 integers
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        match self.require(column)? {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Integer(0) => Ok(false),
            SqlValue::Integer(1) => Ok(true),
            other => Err(Self::mismatch(column, "bool", other)),
        }
    }

    pub fn get_uuid(&self, column: &str) -> Result<Uuid> {
        let text = self.get_string(column)?;
        Uuid::parse_str(&text).map_err(|e| {
            SchemaError::mapping(format!("column '{}': invalid uuid '{}': {}", column, text, e))
        })
    }

    pub fn get_timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        let text = self.get_string(column)?;
        parse_timestamp(&text).ok_or_else(|| {
            SchemaError::mapping(format!(
                "column '{}': invalid timestamp '{}'",
                column, text
            ))
        })
    }

    pub fn get_opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            _ => self.get_timestamp(column).map(Some),
        }
    }

    pub fn get_date(&self, column: &str) -> Result<NaiveDate> {
        let text = self.get_string(column)?;
        NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
            SchemaError::mapping(format!("column '{}': invalid date '{}': {}", column, text, e))
        })
    }

    /// Reassemble the six columns of a location group named `name`
    pub fn get_location(&self, name: &str) -> Result<Location> {
        Ok(Location {
            world: self.get_string(&format!("{}_world", name))?,
            x: self.get_f64(&format!("{}_x", name))?,
            y: self.get_f64(&format!("{}_y", name))?,
            z: self.get_f64(&format!("{}_z", name))?,
            yaw: self.get_f64(&format!("{}_yaw", name))? as f32,
            pitch: self.get_f64(&format!("{}_pitch", name))? as f32,
        })
    }
}

/// Parse the timestamp layouts the supported databases hand back
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_row() -> Row {
        Row::new(
            vec![
                "id".to_string(),
                "name".to_string(),
                "balance".to_string(),
                "banned".to_string(),
                "note".to_string(),
            ],
            vec![
                SqlValue::Integer(7),
                SqlValue::Text("Steve".to_string()),
                SqlValue::Real(12.5),
                SqlValue::Integer(1),
                SqlValue::Null,
            ],
        )
    }

    fn ledger_row(seen_at: &str, joined_on: &str) -> Row {
        Row::new(
            vec![
                "player".to_string(),
                "seen_at".to_string(),
                "banned_at".to_string(),
                "joined_on".to_string(),
            ],
            vec![
                SqlValue::Text("6f1c2a9e-5b3d-4c7a-9e21-0d4b8f3a7c55".to_string()),
                SqlValue::Text(seen_at.to_string()),
                SqlValue::Null,
                SqlValue::Text(joined_on.to_string()),
            ],
        )
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(SqlValue::from("it's").to_sql_literal(), "'it''s'");
        assert_eq!(SqlValue::Integer(3).to_sql_literal(), "3");
        assert_eq!(SqlValue::Real(1.0).to_sql_literal(), "1.0");
        assert_eq!(SqlValue::Bool(false).to_sql_literal(), "FALSE");
        assert_eq!(SqlValue::Blob(vec![0xAB, 0x01]).to_sql_literal(), "X'AB01'");
        assert_eq!(SqlValue::Null.to_sql_literal(), "NULL");
    }

    #[test]
    fn test_conversions() {
        let id = Uuid::nil();
        assert_eq!(
            SqlValue::from(id),
            SqlValue::Text("00000000-0000-0000-0000-000000000000".to_string())
        );

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            SqlValue::from(ts),
            SqlValue::Text("2024-03-01 12:30:00".to_string())
        );
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
    }

    #[test]
    fn test_typed_accessors() {
        let row = sample_row();
        assert_eq!(row.get_i64("id").unwrap(), 7);
        assert_eq!(row.get_string("name").unwrap(), "Steve");
        assert_eq!(row.get_f64("balance").unwrap(), 12.5);
        assert_eq!(row.get_f64("id").unwrap(), 7.0);
        assert!(row.get_bool("banned").unwrap());
        assert_eq!(row.get_opt_string("note").unwrap(), None);
        assert_eq!(row.get_opt_i64("id").unwrap(), Some(7));
        assert_eq!(row.get_opt_i64("note").unwrap(), None);

        let row = ledger_row("2024-03-01 12:30:00", "2024-03-01");
        assert_eq!(
            row.get_uuid("player").unwrap(),
            Uuid::parse_str("6f1c2a9e-5b3d-4c7a-9e21-0d4b8f3a7c55").unwrap()
        );
        assert_eq!(
            row.get_opt_timestamp("seen_at").unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
        assert_eq!(row.get_opt_timestamp("banned_at").unwrap(), None);
        assert_eq!(
            row.get_date("joined_on").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_accessor_errors() {
        let row = sample_row();
        assert!(matches!(row.get_i64("name"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_string("missing"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_bool("id"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_opt_i64("name"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_uuid("name"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_uuid("id"), Err(SchemaError::Mapping(_))));

        let row = ledger_row("last tuesday", "01/03/2024");
        assert!(matches!(row.get_opt_timestamp("seen_at"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_date("joined_on"), Err(SchemaError::Mapping(_))));
        assert!(matches!(row.get_date("player"), Err(SchemaError::Mapping(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_into_map() {
        let map = sample_row().into_map();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("name"), Some(&SqlValue::Text("Steve".to_string())));
    }
}
