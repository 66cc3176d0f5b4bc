//! Core database infrastructure
//!
//! - `value`: [`SqlValue`] parameters and [`Row`] results
//! - `connection`: the [`SqlConnection`] capability and the SQLite [`DatabaseConn`]

mod connection;
mod value;

pub use connection::{DatabaseConn, DriverError, SqlConnection};
pub use value::{parse_timestamp, Row, SqlValue, DATE_FORMAT, TIMESTAMP_FORMAT};
