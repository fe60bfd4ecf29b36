//! PostgreSQL-backed existing-record lookup.

use super::rows::fetch_open_rows;
use sluice_engine::{ExistingLookup, Key, LookupError, Record};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::runtime::Handle;

/// Reads a table's open rows for the engine's synchronous lookup calls.
///
/// Planning runs on a blocking thread; the query is driven to completion on
/// the server runtime through `handle`. Never call it from async context.
pub struct PgLookup<'a> {
    pool: &'a PgPool,
    handle: Handle,
    table_name: &'a str,
    key_fields: &'a [String],
    timeout: Duration,
}

impl<'a> PgLookup<'a> {
    pub fn new(
        pool: &'a PgPool,
        handle: Handle,
        table_name: &'a str,
        key_fields: &'a [String],
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            handle,
            table_name,
            key_fields,
            timeout,
        }
    }
}

impl ExistingLookup for PgLookup<'_> {
    fn lookup(&self, keys: &BTreeSet<Key>) -> Result<HashMap<Key, Record>, LookupError> {
        let row_keys: Vec<serde_json::Value> = keys.iter().map(Key::to_json).collect();

        let rows = self
            .handle
            .block_on(tokio::time::timeout(
                self.timeout,
                fetch_open_rows(self.pool, self.table_name, &row_keys),
            ))
            .map_err(|_| LookupError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| LookupError::Backend(e.to_string()))?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let record = row.to_record().map_err(|e| {
                LookupError::Backend(format!("undecodable row {}: {}", row.row_key, e))
            })?;
            let key = record.key(self.key_fields).ok_or_else(|| {
                LookupError::Backend(format!("row {} is missing key fields", row.row_key))
            })?;
            if found.insert(key.clone(), record).is_some() {
                return Err(LookupError::DuplicateKey(key.to_string()));
            }
        }

        tracing::debug!(
            table = self.table_name,
            requested = keys.len(),
            found = found.len(),
            "looked up open rows"
        );
        Ok(found)
    }
}
