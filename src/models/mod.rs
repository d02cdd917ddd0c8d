//! Defines the serde data shapes written to and read from disk by the local store.
//!
//! Includes structs for:
//! - The plaintext snapshot used by `export` / `import` (`Snapshot`).
//! - The sealed envelope used for database files and encrypted exports (`SealedSnapshot`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current version of the sealed envelope format.
pub const SEALED_FORMAT_VERSION: u8 = 1;

/// The full contents of a database: an ordered map of keys to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Merges `other` into `self`. Entries in `other` win on conflicting keys.
    pub fn merge(&mut self, other: Snapshot) -> usize {
        let count = other.entries.len();
        self.entries.extend(other.entries);
        count
    }
}

/// AES-256-GCM envelope around a serialized `Snapshot`. Binary fields are hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSnapshot {
    pub format_version: u8,
    pub nonce: String,
    pub ciphertext: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites_conflicts() {
        let mut base = Snapshot::default();
        base.entries.insert("a".to_string(), json!(1));
        base.entries.insert("b".to_string(), json!(2));

        let mut incoming = Snapshot::default();
        incoming.entries.insert("b".to_string(), json!("two"));
        incoming.entries.insert("c".to_string(), json!([3]));

        assert_eq!(base.merge(incoming), 2);
        assert_eq!(base.entries.len(), 3);
        assert_eq!(base.entries["b"], json!("two"));
    }

    #[test]
    fn test_snapshot_without_entries_field_parses() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.entries.is_empty());
    }
}
