//! Parameter-level diff between two records.

use crate::record::ValueRecord;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub kind: DiffKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (None, Some(new)) => write!(f, "+ {} = {}", self.key, new),
            (Some(old), None) => write!(f, "- {} = {}", self.key, old),
            (Some(old), Some(new)) => write!(f, "~ {}: {} -> {}", self.key, old, new),
            (None, None) => write!(f, "  {}", self.key),
        }
    }
}

/// Keys added, removed or changed going from `old` to `new`, sorted by key.
/// An integer and a real with the same numeric value are not a change.
pub fn diff(old: &ValueRecord, new: &ValueRecord) -> Vec<DiffEntry> {
    let keys: BTreeSet<&str> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let kind = match (old.get(key), new.get(key)) {
                (None, Some(_)) => DiffKind::Added,
                (Some(_), None) => DiffKind::Removed,
                (Some(a), Some(b)) if !a.loosely_eq(b) => DiffKind::Changed,
                _ => return None,
            };
            Some(DiffEntry {
                key: key.to_string(),
                kind,
                old: old.get(key).cloned(),
                new: new.get(key).cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_removed_changed_sorted() {
        let a: ValueRecord = [("remora.v", 0i64), ("remora.max_step", 10), ("amr.max_level", 0)]
            .into_iter()
            .collect();
        let mut b = a.without("amr.max_level");
        b.insert("remora.v", 1i64);
        b.insert("custom.extra", 7i64);
        let d = diff(&a, &b);
        let summary: Vec<_> = d.iter().map(|e| (e.key.as_str(), e.kind)).collect();
        assert_eq!(
            summary,
            [
                ("amr.max_level", DiffKind::Removed),
                ("custom.extra", DiffKind::Added),
                ("remora.v", DiffKind::Changed),
            ]
        );
        assert_eq!(d[2].to_string(), "~ remora.v: 0 -> 1");
    }

    #[test]
    fn numeric_widening_is_not_a_change() {
        let a: ValueRecord = [("remora.fixed_dt", Value::Integer(300))].into_iter().collect();
        let b: ValueRecord = [("remora.fixed_dt", Value::Real(300.0))].into_iter().collect();
        assert!(diff(&a, &b).is_empty());
    }
}
