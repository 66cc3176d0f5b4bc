//! Typed decoding of result rows
//!
//! A [`ResultMapper`] holds one decoder per target type. Decoders are plain
//! functions from a [`Row`] to the target value; registering a second decoder
//! for the same type replaces the first.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::database::core::Row;
use crate::error::{Result, SchemaError};

type Decoder<T> = Box<dyn Fn(&Row) -> Result<T> + Send + Sync>;

/// Registry of row decoders keyed by target type
#[derive(Default)]
pub struct ResultMapper {
    decoders: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ResultMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the decoder used for `T`
    pub fn register<T, F>(&mut self, decoder: F) -> &mut Self
    where
        T: 'static,
        F: Fn(&Row) -> Result<T> + Send + Sync + 'static,
    {
        let boxed: Decoder<T> = Box::new(decoder);
        self.decoders.insert(TypeId::of::<T>(), Box::new(boxed));
        self
    }

    /// Whether a decoder is registered for `T`
    pub fn supports<T: 'static>(&self) -> bool {
        self.decoders.contains_key(&TypeId::of::<T>())
    }

    fn decoder<T: 'static>(&self) -> Result<&Decoder<T>> {
        self.decoders
            .get(&TypeId::of::<T>())
            .and_then(|d| d.downcast_ref::<Decoder<T>>())
            .ok_or_else(|| {
                SchemaError::mapping(format!("no decoder registered for {}", type_name::<T>()))
            })
    }

    /// Decode one row into `T`
    pub fn decode<T: 'static>(&self, row: &Row) -> Result<T> {
        let decoder = self.decoder::<T>()?;
        decoder(row)
    }

    /// Decode every row, failing on the first row that does not decode
    pub fn decode_all<T: 'static>(&self, rows: &[Row]) -> Result<Vec<T>> {
        let decoder = self.decoder::<T>()?;
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                decoder(row).map_err(|e| match e {
                    SchemaError::Mapping(message) => SchemaError::mapping(format!(
                        "row {} as {}: {}",
                        idx,
                        type_name::<T>(),
                        message
                    )),
                    other => other,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ResultMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultMapper")
            .field("decoders", &self.decoders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::SqlValue;

    #[derive(Debug, PartialEq)]
    struct Player {
        name: String,
        balance: f64,
    }

    fn player_row(name: &str, balance: SqlValue) -> Row {
        Row::new(
            vec!["name".to_string(), "balance".to_string()],
            vec![SqlValue::from(name), balance],
        )
    }

    fn mapper() -> ResultMapper {
        let mut mapper = ResultMapper::new();
        mapper.register(|row: &Row| {
            Ok(Player {
                name: row.get_string("name")?,
                balance: row.get_f64("balance")?,
            })
        });
        mapper
    }

    #[test]
    fn test_decode_registered_type() {
        let mapper = mapper();
        assert!(mapper.supports::<Player>());

        let player: Player = mapper
            .decode(&player_row("Steve", SqlValue::Integer(12)))
            .unwrap();
        assert_eq!(
            player,
            Player {
                name: "Steve".to_string(),
                balance: 12.0
            }
        );
    }

    #[test]
    fn test_missing_decoder_is_mapping_error() {
        let mapper = ResultMapper::new();
        let err = mapper
            .decode::<Player>(&player_row("Steve", SqlValue::Real(1.0)))
            .unwrap_err();
        match err {
            SchemaError::Mapping(message) => assert!(message.contains("Player")),
            other => panic!("expected mapping error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_all_fails_on_any_bad_row() {
        let mapper = mapper();
        let rows = vec![
            player_row("Steve", SqlValue::Real(1.5)),
            player_row("Alex", SqlValue::from("lots")),
        ];

        let err = mapper.decode_all::<Player>(&rows).unwrap_err();
        match err {
            SchemaError::Mapping(message) => assert!(message.starts_with("row 1")),
            other => panic!("expected mapping error, got {:?}", other),
        }
        assert_eq!(mapper.decode_all::<Player>(&rows[..1]).unwrap().len(), 1);
    }

    #[test]
    fn test_register_replaces_decoder() {
        let mut mapper = ResultMapper::new();
        mapper.register(|_: &Row| Ok(1_i64));
        mapper.register(|_: &Row| Ok(2_i64));

        let row = Row::new(Vec::new(), Vec::new());
        assert_eq!(mapper.decode::<i64>(&row).unwrap(), 2);
    }
}
