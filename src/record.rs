//! Ordered key → value record for one configuration.
//!
//! Insertion order is kept. Entries that came out of the parser remember the
//! source lexeme of their value so the writer can reproduce it verbatim; any
//! later `insert` on that key forgets it.

use crate::value::Value;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A key the input-file grammar can read back: non-empty, with no whitespace,
/// `=`, `#` or `"`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '=' | '#' | '"'))
}

#[derive(Debug, Clone)]
pub struct Entry {
    key: String,
    value: Value,
    lexeme: Option<String>,
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Raw value text from the source line, if the entry is unchanged since parse.
    pub fn lexeme(&self) -> Option<&str> {
        self.lexeme.as_deref()
    }
}

/// Ordered mapping from parameter key to value.
#[derive(Debug, Clone, Default)]
pub struct ValueRecord {
    entries: Vec<Entry>,
    by_key: HashMap<String, usize>,
}

impl ValueRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entry(key).map(Entry::value)
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Position of `key` in record order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Set `key`. An existing key keeps its position; a new key is appended.
    /// Returns the previous value.
    ///
    /// The key is stored as given; only keys passing [`is_valid_key`] can be
    /// written to an input file and read back.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.put(key.into(), value.into(), None)
    }

    pub(crate) fn insert_parsed(&mut self, key: String, value: Value, lexeme: String) {
        self.put(key, value, Some(lexeme));
    }

    fn put(&mut self, key: String, value: Value, lexeme: Option<String>) -> Option<Value> {
        match self.by_key.get(&key) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.lexeme = lexeme;
                Some(std::mem::replace(&mut entry.value, value))
            }
            None => {
                self.by_key.insert(key.clone(), self.entries.len());
                self.entries.push(Entry { key, value, lexeme });
                None
            }
        }
    }

    /// Remove `key`, keeping the relative order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.by_key.remove(key)?;
        let entry = self.entries.remove(i);
        for e in &self.entries[i..] {
            if let Some(slot) = self.by_key.get_mut(&e.key) {
                *slot -= 1;
            }
        }
        Some(entry.value)
    }

    /// Copy of this record with `key` set.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<Value>) -> ValueRecord {
        let mut next = self.clone();
        next.insert(key, value);
        next
    }

    /// Copy of this record without `key`.
    pub fn without(&self, key: &str) -> ValueRecord {
        let mut next = self.clone();
        next.remove(key);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

/// Keys, values and order; lexemes are ignored.
impl PartialEq for ValueRecord {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.key == b.key && a.value == b.value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = ValueRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for ValueRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for e in &self.entries {
            map.serialize_entry(&e.key, &e.value)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = ValueRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter keys to scalar or list values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ValueRecord, A::Error> {
        let mut record = ValueRecord::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            if !is_valid_key(&key) {
                return Err(serde::de::Error::custom(format!(
                    "invalid parameter key {:?}",
                    key
                )));
            }
            record.insert(key, value);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for ValueRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}
