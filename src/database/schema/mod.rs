//! Table definitions
//!
//! - `column`: data-only column, constraint and filter descriptions
//! - `builder`: the fluent [`SchemaBuilder`] and the built [`Schema`]

mod builder;
mod column;

pub use builder::{OperationKind, Schema, SchemaBuilder};
pub use column::{
    ColumnKind, ColumnSpec, ColumnValue, ConstraintSpec, Location, WhereSpec,
    DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, DEFAULT_STRING_LENGTH, LOCATION_SUFFIXES,
};
