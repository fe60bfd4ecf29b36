//! Planning strategies.
//!
//! Every strategy implements [`Planner`], so callers hold a
//! `Box<dyn Planner>` and never branch on which strategy they were given.
//!
//! - [`AppendPlanner`] - INSERT everything
//! - [`UpsertPlanner`] - UPDATE keys that exist, INSERT the rest
//! - [`HistoryPlanner`] - close out changed versions and open new ones (type 2)

mod append;
mod history;
mod upsert;

pub use append::AppendPlanner;
pub use history::{far_future, HistoryPlanner};
pub use upsert::UpsertPlanner;

use crate::{
    error::Result, Clock, ConfigError, Error, ExistingLookup, Key, KeyGenerator, MutationType,
    Plan, PlannerConfig, Record, SystemClock, UuidKeyGenerator,
};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Context string used when validating arriving records.
pub(crate) const ARRIVING_BATCH: &str = "arriving batch";

/// A mutation-planning strategy.
///
/// Planners are immutable after construction and may be shared across
/// threads and concurrent planning calls.
pub trait Planner: Send + Sync + fmt::Debug {
    /// Name the strategy is registered under.
    fn strategy_name(&self) -> &str;

    /// Plan the mutations needed to apply `batch`.
    ///
    /// Stateful strategies call `existing` at most once, with every key in
    /// the batch. Strategies that do not compare ignore it.
    fn plan_mutations_for_batch(
        &self,
        batch: &[Record],
        existing: &dyn ExistingLookup,
    ) -> Result<Plan>;

    /// Every mutation type this planner can emit, independent of any batch.
    fn emitted_mutation_types(&self) -> BTreeSet<MutationType>;
}

/// Ambient sources injected into planners.
#[derive(Clone)]
pub struct Capabilities {
    pub clock: Arc<dyn Clock>,
    pub keys: Arc<dyn KeyGenerator>,
}

impl Capabilities {
    pub fn new(clock: Arc<dyn Clock>, keys: Arc<dyn KeyGenerator>) -> Self {
        Self { clock, keys }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            keys: Arc::new(UuidKeyGenerator),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

fn require_key_fields(config: &PlannerConfig, strategy: &'static str) -> Result<Vec<String>> {
    if !config.has_key_fields() {
        return Err(ConfigError::KeyFieldsRequired(strategy).into());
    }
    Ok(config.key_fields().to_vec())
}

fn key_of(record: &Record, key_fields: &[String]) -> Result<Key> {
    record.key(key_fields).ok_or_else(|| {
        let missing = key_fields
            .iter()
            .find(|f| !record.contains(f))
            .cloned()
            .unwrap_or_default();
        Error::MissingKeyField(missing)
    })
}

/// Collapse records sharing a key, last arrival wins.
///
/// Keys keep the position of their first appearance in the batch.
fn latest_by_key(records: Vec<Record>, key_fields: &[String]) -> Result<Vec<(Key, Record)>> {
    let mut positions: HashMap<Key, usize> = HashMap::with_capacity(records.len());
    let mut latest: Vec<(Key, Record)> = Vec::with_capacity(records.len());

    for record in records {
        let key = key_of(&record, key_fields)?;
        match positions.get(&key) {
            Some(&i) => latest[i].1 = record,
            None => {
                positions.insert(key.clone(), latest.len());
                latest.push((key, record));
            }
        }
    }
    Ok(latest)
}

/// Whether two records agree on every named field.
fn same_values<'a>(a: &Record, b: &Record, fields: impl IntoIterator<Item = &'a str>) -> bool {
    fields.into_iter().all(|f| a.get(f) == b.get(f))
}
