//! Column, constraint and filter descriptions
//!
//! These are plain data. The builder produces them, the dialect translator
//! consumes them; neither side interprets them anywhere else.

use serde::{Deserialize, Serialize};

use crate::database::core::SqlValue;

/// Default precision of a `decimal` column declared without one
pub const DEFAULT_DECIMAL_PRECISION: u32 = 65;

/// Default scale of a `decimal` column declared without one
pub const DEFAULT_DECIMAL_SCALE: u32 = 30;

/// Default length of a `string` column declared from a value
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Suffixes of the six concrete columns a location group expands into
pub const LOCATION_SUFFIXES: [&str; 6] = ["world", "x", "y", "z", "yaw", "pitch"];

/// Abstract column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    String(u32),
    Text,
    LongText,
    Decimal { precision: u32, scale: u32 },
    BigInt,
    Integer,
    Boolean,
    Date,
    Timestamp,
    /// Composite world/x/y/z/yaw/pitch group
    Location,
}

/// A position in a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(world: &str, x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            world: world.to_string(),
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    /// The six scalar values in expansion order
    pub fn to_values(&self) -> [SqlValue; 6] {
        [
            SqlValue::Text(self.world.clone()),
            SqlValue::Real(self.x),
            SqlValue::Real(self.y),
            SqlValue::Real(self.z),
            SqlValue::Real(self.yaw as f64),
            SqlValue::Real(self.pitch as f64),
        ]
    }
}

/// Value carried by a column for insert and update statements
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Scalar(SqlValue),
    Location(Location),
}

/// One declared column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub default: Option<SqlValue>,
    pub value: Option<ColumnValue>,
    pub nullable: bool,
    pub auto_increment: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            value: None,
            nullable: false,
            auto_increment: false,
        }
    }

    /// Concrete column names this column occupies in a table
    pub fn expanded_names(&self) -> Vec<String> {
        match self.kind {
            ColumnKind::Location => LOCATION_SUFFIXES
                .iter()
                .map(|suffix| format!("{}_{}", self.name, suffix))
                .collect(),
            _ => vec![self.name.clone()],
        }
    }

    /// Values to bind for this column, in expanded-name order
    pub fn bound_values(&self) -> Option<Vec<SqlValue>> {
        match &self.value {
            None => None,
            Some(ColumnValue::Scalar(v)) => Some(vec![v.clone()]),
            Some(ColumnValue::Location(loc)) => Some(loc.to_values().to_vec()),
        }
    }
}

/// A table-level structural constraint
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSpec {
    PrimaryKey(Vec<String>),
    ForeignKey {
        column: String,
        reference_table: String,
        reference_column: String,
        on_cascade: bool,
    },
    /// Both `created_at` and `updated_at`
    Timestamps,
    CreatedAt,
    UpdatedAt,
}

/// One filter predicate; a list of them is conjoined with AND
#[derive(Debug, Clone, PartialEq)]
pub struct WhereSpec {
    pub column: String,
    pub operator: String,
    pub value: SqlValue,
}

impl WhereSpec {
    pub fn new(column: &str, operator: &str, value: SqlValue) -> Self {
        Self {
            column: column.to_string(),
            operator: operator.trim().to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_expansion() {
        let column = ColumnSpec::new("home", ColumnKind::Location);
        assert_eq!(
            column.expanded_names(),
            vec![
                "home_world",
                "home_x",
                "home_y",
                "home_z",
                "home_yaw",
                "home_pitch"
            ]
        );

        let plain = ColumnSpec::new("name", ColumnKind::String(16));
        assert_eq!(plain.expanded_names(), vec!["name"]);
    }

    #[test]
    fn test_bound_values_follow_expansion_order() {
        let mut column = ColumnSpec::new("home", ColumnKind::Location);
        column.value = Some(ColumnValue::Location(Location::new(
            "world", 1.0, 64.0, -3.5, 90.0, 0.0,
        )));

        let values = column.bound_values().unwrap();
        assert_eq!(values.len(), 6);
        assert_eq!(values[0], SqlValue::Text("world".to_string()));
        assert_eq!(values[3], SqlValue::Real(-3.5));
    }
}
