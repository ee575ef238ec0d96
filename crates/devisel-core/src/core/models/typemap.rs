use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maps chemical element symbols to the integer type indices a model was trained with.
///
/// Every member of an ensemble must share one type map; training and inference use
/// the same mapping so that atom types line up with the model's descriptor layout.
/// The map is ordered by symbol, which keeps its serialized forms deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeMap {
    indices: BTreeMap<String, usize>,
}

impl TypeMap {
    /// Builds a type map from `(symbol, index)` pairs.
    ///
    /// Later duplicates of a symbol overwrite earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let indices = pairs
            .into_iter()
            .map(|(symbol, index)| (symbol.into(), index))
            .collect();
        Self { indices }
    }

    /// Returns the type index for a species, if the species is covered.
    pub fn index_of(&self, species: &str) -> Option<usize> {
        self.indices.get(species).copied()
    }

    /// Returns `true` if the species is covered by this map.
    pub fn contains(&self, species: &str) -> bool {
        self.indices.contains_key(species)
    }

    /// Iterates over the covered species symbols in sorted order.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeMapParseError {
    #[error("Malformed type map entry '{entry}', expected 'symbol:index'")]
    MalformedEntry { entry: String },

    #[error("Invalid type index in entry '{entry}'")]
    InvalidIndex { entry: String },
}

impl FromStr for TypeMap {
    type Err = TypeMapParseError;

    /// Parses the compact wire form `"O:1,Si:0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut indices = BTreeMap::new();
        for entry in s.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (symbol, index) =
                entry
                    .split_once(':')
                    .ok_or_else(|| TypeMapParseError::MalformedEntry {
                        entry: entry.to_string(),
                    })?;
            let index: usize =
                index
                    .trim()
                    .parse()
                    .map_err(|_| TypeMapParseError::InvalidIndex {
                        entry: entry.to_string(),
                    })?;
            indices.insert(symbol.trim().to_string(), index);
        }
        Ok(Self { indices })
    }
}

impl fmt::Display for TypeMap {
    /// Writes the compact wire form `"O:1,Si:0"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (symbol, index) in &self.indices {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", symbol, index)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_and_index_lookup_work() {
        let map = TypeMap::from_pairs([("Si", 0), ("O", 1)]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.index_of("Si"), Some(0));
        assert_eq!(map.index_of("O"), Some(1));
        assert_eq!(map.index_of("H"), None);
        assert!(map.contains("O"));
        assert!(!map.contains("H"));
    }

    #[test]
    fn wire_form_round_trips() {
        let map = TypeMap::from_pairs([("Si", 0), ("O", 1), ("H", 2)]);
        let encoded = map.to_string();
        let decoded: TypeMap = encoded.parse().unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn display_is_sorted_by_symbol() {
        let map = TypeMap::from_pairs([("Si", 0), ("O", 1)]);
        assert_eq!(map.to_string(), "O:1,Si:0");
    }

    #[test]
    fn parse_tolerates_whitespace() {
        let map: TypeMap = " Si : 0 , O : 1 ".parse().unwrap();
        assert_eq!(map.index_of("Si"), Some(0));
        assert_eq!(map.index_of("O"), Some(1));
    }

    #[test]
    fn parse_rejects_missing_separator() {
        let err = "Si0".parse::<TypeMap>().unwrap_err();
        assert!(matches!(err, TypeMapParseError::MalformedEntry { .. }));
    }

    #[test]
    fn parse_rejects_non_numeric_index() {
        let err = "Si:zero".parse::<TypeMap>().unwrap_err();
        assert!(matches!(err, TypeMapParseError::InvalidIndex { .. }));
    }
}
