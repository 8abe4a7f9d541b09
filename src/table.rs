//! Write-once lookup tables and identifier sequences.
//!
//! Per-run tables (identity map, charge resolutions) are filled once per key
//! and read-only afterwards. A second write to an existing key is a defect in
//! the calling stage and is rejected instead of silently overwriting.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

/// Errors raised by write-once tables
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A key was written twice
    #[error("Duplicate write to table '{table}' for key {key}")]
    DuplicateKey {
        /// Table name
        table: &'static str,
        /// Offending key, formatted
        key: String,
    },

    /// A key expected to be present is missing
    #[error("No entry in table '{table}' for key {key}")]
    MissingKey {
        /// Table name
        table: &'static str,
        /// Missing key, formatted
        key: String,
    },

    /// An identifier sequence ran out of values
    #[error("Identifier sequence '{0}' exhausted")]
    SequenceExhausted(&'static str),
}

/// Hash map that accepts exactly one value per key
#[derive(Debug, Clone)]
pub struct WriteOnceMap<K, V> {
    name: &'static str,
    entries: HashMap<K, V>,
}

impl<K, V> WriteOnceMap<K, V>
where
    K: Eq + Hash + Display,
{
    /// Create an empty table; `name` is used in error messages
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    /// Insert a value, failing if the key is already present
    pub fn insert(&mut self, key: K, value: V) -> Result<(), TableError> {
        if self.entries.contains_key(&key) {
            return Err(TableError::DuplicateKey {
                table: self.name,
                key: key.to_string(),
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Look up a value
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Whether a value has been written for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Table name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Monotonically increasing allocator for record identifiers
#[derive(Debug, Clone)]
pub struct IdSequence<T> {
    name: &'static str,
    next: u32,
    _marker: PhantomData<T>,
}

impl<T> IdSequence<T>
where
    T: From<u32> + Debug,
{
    /// Sequence starting at 1
    pub fn new(name: &'static str) -> Self {
        Self::starting_at(name, 1)
    }

    /// Sequence starting at an arbitrary value
    pub fn starting_at(name: &'static str, first: u32) -> Self {
        Self {
            name,
            next: first,
            _marker: PhantomData,
        }
    }

    /// Allocate the next identifier
    pub fn next_id(&mut self) -> Result<T, TableError> {
        let id = self.next;
        self.next = self
            .next
            .checked_add(1)
            .ok_or(TableError::SequenceExhausted(self.name))?;
        Ok(T::from(id))
    }

    /// Next identifier that would be handed out
    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IonId;

    #[test]
    fn test_write_once_rejects_second_write() {
        let mut table: WriteOnceMap<u32, &str> = WriteOnceMap::new("charges");
        table.insert(1, "first").unwrap();

        let err = table.insert(1, "second").unwrap_err();
        assert!(matches!(err, TableError::DuplicateKey { table: "charges", .. }));
        assert_eq!(table.get(&1), Some(&"first"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_id_sequence_is_monotonic() {
        let mut seq: IdSequence<IonId> = IdSequence::new("ions");
        assert_eq!(seq.next_id().unwrap(), IonId(1));
        assert_eq!(seq.next_id().unwrap(), IonId(2));
        assert_eq!(seq.peek(), 3);
    }

    #[test]
    fn test_id_sequence_exhaustion() {
        let mut seq: IdSequence<IonId> = IdSequence::starting_at("ions", u32::MAX);
        assert!(seq.next_id().is_err());
    }
}
