//! Access to the existing state of the target table.

use crate::{error::Result, Key, LookupError, Record};
use std::collections::{BTreeSet, HashMap};

/// Fetches the current version of existing records by key.
///
/// Planners call this at most once per planning call, with every key of the
/// batch. Implementations return at most one record per key; a missing key
/// means no existing record. They must fail rather than return a partial
/// answer, and any timeout is theirs to enforce.
pub trait ExistingLookup {
    fn lookup(&self, keys: &BTreeSet<Key>) -> std::result::Result<HashMap<Key, Record>, LookupError>;
}

impl<T: ExistingLookup + ?Sized> ExistingLookup for &T {
    fn lookup(&self, keys: &BTreeSet<Key>) -> std::result::Result<HashMap<Key, Record>, LookupError> {
        (**self).lookup(keys)
    }
}

/// A lookup for tables with nothing in them, or planners that never look.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExisting;

impl ExistingLookup for NoExisting {
    fn lookup(&self, _keys: &BTreeSet<Key>) -> std::result::Result<HashMap<Key, Record>, LookupError> {
        Ok(HashMap::new())
    }
}

/// Existing records held in memory, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLookup {
    records: HashMap<Key, Record>,
}

impl InMemoryLookup {
    /// Index records by the given key fields.
    ///
    /// Later records replace earlier ones with the same key. Records missing
    /// a key field are skipped.
    pub fn new(key_fields: &[String], records: impl IntoIterator<Item = Record>) -> Self {
        let records = records
            .into_iter()
            .filter_map(|record| record.key(key_fields).map(|key| (key, record)))
            .collect();
        Self { records }
    }

    /// Add or replace a record under an explicit key.
    pub fn insert(&mut self, key: Key, record: Record) {
        self.records.insert(key, record);
    }

    pub fn get(&self, key: &Key) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExistingLookup for InMemoryLookup {
    fn lookup(&self, keys: &BTreeSet<Key>) -> std::result::Result<HashMap<Key, Record>, LookupError> {
        Ok(keys
            .iter()
            .filter_map(|key| self.records.get(key).map(|r| (key.clone(), r.clone())))
            .collect())
    }
}

/// Run a lookup and verify the answer against what was asked.
///
/// Every returned key must have been requested, and each returned record
/// must project onto the key it was returned under.
pub(crate) fn fetch_existing(
    lookup: &dyn ExistingLookup,
    keys: &BTreeSet<Key>,
    key_fields: &[String],
) -> Result<HashMap<Key, Record>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let found = lookup.lookup(keys)?;
    for (key, record) in &found {
        if !keys.contains(key) || record.key(key_fields).as_ref() != Some(key) {
            return Err(LookupError::UnexpectedKey(key.to_string()).into());
        }
    }

    tracing::debug!(
        requested = keys.len(),
        found = found.len(),
        "fetched existing records"
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Value};
    use std::cell::Cell;

    fn key(id: i64) -> Key {
        Key(vec![Value::Int(id)])
    }

    fn id_fields() -> Vec<String> {
        vec!["id".to_string()]
    }

    #[test]
    fn in_memory_lookup_returns_only_requested() {
        let lookup = InMemoryLookup::new(
            &id_fields(),
            vec![
                Record::new().with("id", 1).with("name", "a"),
                Record::new().with("id", 2).with("name", "b"),
            ],
        );

        let found = lookup.lookup(&BTreeSet::from([key(2), key(3)])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&key(2)].get("name"), Some(&Value::from("b")));
    }

    #[test]
    fn no_lookup_for_empty_key_set() {
        struct Counting(Cell<usize>);
        impl ExistingLookup for Counting {
            fn lookup(
                &self,
                _keys: &BTreeSet<Key>,
            ) -> std::result::Result<HashMap<Key, Record>, LookupError> {
                self.0.set(self.0.get() + 1);
                Ok(HashMap::new())
            }
        }

        let counting = Counting(Cell::new(0));
        fetch_existing(&counting, &BTreeSet::new(), &id_fields()).unwrap();
        assert_eq!(counting.0.get(), 0);
    }

    #[test]
    fn unrequested_key_rejected() {
        let lookup = InMemoryLookup::new(&id_fields(), vec![Record::new().with("id", 1)]);
        struct Liar(InMemoryLookup);
        impl ExistingLookup for Liar {
            fn lookup(
                &self,
                _keys: &BTreeSet<Key>,
            ) -> std::result::Result<HashMap<Key, Record>, LookupError> {
                self.0.lookup(&BTreeSet::from([key(1)]))
            }
        }

        let result = fetch_existing(&Liar(lookup), &BTreeSet::from([key(2)]), &id_fields());
        assert!(matches!(
            result,
            Err(Error::Lookup(LookupError::UnexpectedKey(_)))
        ));
    }

    #[test]
    fn record_under_wrong_key_rejected() {
        let mut lookup = InMemoryLookup::default();
        lookup.insert(key(1), Record::new().with("id", 5));

        let result = fetch_existing(&lookup, &BTreeSet::from([key(1)]), &id_fields());
        assert!(matches!(
            result,
            Err(Error::Lookup(LookupError::UnexpectedKey(_)))
        ));
    }

    #[test]
    fn backend_errors_propagate_unchanged() {
        struct Down;
        impl ExistingLookup for Down {
            fn lookup(
                &self,
                _keys: &BTreeSet<Key>,
            ) -> std::result::Result<HashMap<Key, Record>, LookupError> {
                Err(LookupError::Backend("connection refused".into()))
            }
        }

        let result = fetch_existing(&Down, &BTreeSet::from([key(1)]), &id_fields());
        assert_eq!(
            result,
            Err(Error::Lookup(LookupError::Backend(
                "connection refused".into()
            )))
        );
    }
}
