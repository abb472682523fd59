//! Snapshot of entity keys used for referential checks

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use crate::core::record::RecordType;
use crate::etl::validate::ReferenceLookup;

/// Keys present in the store for a set of record types.
///
/// Taken right before a file is validated, so it sees every entity committed
/// by earlier files of the same batch.
#[derive(Debug, Default, Clone)]
pub struct KnownKeys {
    keys: HashMap<RecordType, HashSet<String>>,
}

impl KnownKeys {
    /// Load the keys of every given record type
    pub fn load(conn: &Connection, types: &[RecordType]) -> rusqlite::Result<Self> {
        let mut known = KnownKeys::default();
        for rt in types {
            let sql = format!(
                "SELECT CAST({} AS TEXT) FROM {}",
                rt.key_column(),
                rt.table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let set = known.keys.entry(*rt).or_default();
            for key in rows {
                set.insert(key?);
            }
        }
        Ok(known)
    }

    /// Add keys by hand (tests, dry runs)
    pub fn with<I, S>(mut self, record_type: RecordType, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys
            .entry(record_type)
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Number of keys known for a record type
    pub fn count(&self, record_type: RecordType) -> usize {
        self.keys.get(&record_type).map_or(0, HashSet::len)
    }
}

impl ReferenceLookup for KnownKeys {
    fn resolves(&self, target: RecordType, key: &str) -> bool {
        self.keys
            .get(&target)
            .is_some_and(|set| set.contains(key))
    }
}
