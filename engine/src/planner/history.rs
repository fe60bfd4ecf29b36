//! History-preserving (type 2) planning.
//!
//! Each key has at most one open version in storage, marked by an
//! effective-to of [`far_future`] (and, optionally, a current flag of
//! `true`). When an arriving record differs from the open version, the open
//! version is closed at the arrival's effective time and a new open version
//! is inserted. Validity intervals are half-open: `[effective_from, effective_to)`.
//!
//! # Algorithm
//!
//! 1. Enrich the batch and group arrivals by key (first-appearance order)
//! 2. Order each key's arrivals by effective time, stable on arrival order;
//!    of several arrivals at the same time only the last is kept
//! 3. Fetch every key's open version in one lookup
//! 4. Walk each key's arrivals, comparing against the version open so far:
//!    - equal on the compared fields: nothing happens
//!    - earlier than the open version's effective-from: skipped as late
//!    - otherwise: close the open version and open the arrival
//! 5. Emit close-outs (UPDATE, or DELETE in delete mode) before INSERTs

use super::{key_of, require_key_fields, same_values, Capabilities, Planner, ARRIVING_BATCH};
use crate::config::{CloseMode, EFFECTIVE_FROM_FIELD_NAME, EFFECTIVE_TO_FIELD_NAME};
use crate::{
    error::Result, lookup::fetch_existing, ConfigError, Enricher, Error, ExistingLookup, Key,
    MutationType, Plan, PlannerConfig, Record, Schema, Value,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// Effective-to of an open version: 9999-12-31 23:59:59 UTC.
pub fn far_future() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The version a key's next arrival is compared against.
enum Open {
    /// The stored open version
    Stored {
        record: Record,
        from: Option<DateTime<Utc>>,
    },
    /// A version opened earlier in this batch
    Arrived { record: Record, from: DateTime<Utc> },
}

impl Open {
    fn record(&self) -> &Record {
        match self {
            Open::Stored { record, .. } | Open::Arrived { record, .. } => record,
        }
    }

    fn starts(&self) -> Option<DateTime<Utc>> {
        match self {
            Open::Stored { from, .. } => *from,
            Open::Arrived { from, .. } => Some(*from),
        }
    }
}

/// Mutations accumulated across all keys of one planning call.
#[derive(Default)]
struct Changes {
    closed: Vec<Record>,
    deleted: Vec<Record>,
    inserted: Vec<Record>,
    skipped_late: usize,
    unchanged: usize,
}

/// Plans slowly-changing (type 2) history for a keyed table.
#[derive(Debug, Clone)]
pub struct HistoryPlanner {
    key_fields: Vec<String>,
    effective_from: String,
    effective_to: String,
    current_flag: Option<String>,
    event_time: Option<String>,
    value_fields: Option<Vec<String>>,
    close_mode: CloseMode,
    enricher: Enricher,
}

impl HistoryPlanner {
    pub const NAME: &'static str = "type2";

    /// Fails without key fields or validity column names.
    pub fn new(config: &PlannerConfig, caps: &Capabilities) -> Result<Self> {
        let key_fields = require_key_fields(config, Self::NAME)?;
        let history = config.history();
        let effective_from = history
            .effective_from
            .clone()
            .ok_or(ConfigError::MissingValidityField(EFFECTIVE_FROM_FIELD_NAME))?;
        let effective_to = history
            .effective_to
            .clone()
            .ok_or(ConfigError::MissingValidityField(EFFECTIVE_TO_FIELD_NAME))?;

        Ok(Self {
            key_fields,
            effective_from,
            effective_to,
            current_flag: history.current_flag.clone(),
            event_time: history.event_time.clone(),
            value_fields: history.value_fields.clone(),
            close_mode: history.close_mode,
            enricher: Enricher::new(config, caps.clock.clone(), caps.keys.clone()),
        })
    }

    pub fn close_mode(&self) -> CloseMode {
        self.close_mode
    }

    pub fn plan(&self, batch: &[Record], existing: &dyn ExistingLookup) -> Result<Plan> {
        let Some(schema) = Schema::of_batch(batch, ARRIVING_BATCH)? else {
            self.enricher.enrich(batch)?;
            return Ok(Plan::new());
        };

        let now = self.enricher.clock().now();
        let enriched = self.enricher.enrich_at(batch, now)?;
        let compared = self.compared_fields(&schema)?;
        let groups = self.group_arrivals(enriched, now)?;

        let keys: BTreeSet<Key> = groups.iter().map(|(key, _)| key.clone()).collect();
        let mut found = fetch_existing(existing, &keys, &self.key_fields)?;

        let mut changes = Changes::default();
        for (key, arrivals) in groups {
            let stored = match found.remove(&key) {
                Some(record) => {
                    schema.check_comparable(
                        &record,
                        compared.iter().map(String::as_str),
                        "existing open version",
                    )?;
                    let from = record.get(&self.effective_from).and_then(as_instant);
                    Some(Open::Stored { record, from })
                }
                None => None,
            };
            self.plan_key(stored, arrivals, &compared, now, &mut changes);
        }

        let (close_kind, closing, inserts) = match self.close_mode {
            CloseMode::Update => (MutationType::Update, changes.closed, changes.inserted),
            CloseMode::Delete => {
                let mut inserts = changes.closed;
                inserts.extend(changes.inserted);
                (MutationType::Delete, changes.deleted, inserts)
            }
        };

        let mut plan = Plan::new();
        plan.push(close_kind, closing)?;
        plan.push(MutationType::Insert, inserts)?;

        tracing::debug!(
            strategy = Self::NAME,
            arriving = batch.len(),
            keys = keys.len(),
            mutations = plan.len(),
            records = plan.record_count(),
            unchanged = changes.unchanged,
            late = changes.skipped_late,
            "planned batch"
        );
        Ok(plan)
    }

    fn plan_key(
        &self,
        stored: Option<Open>,
        arrivals: Vec<(DateTime<Utc>, Record)>,
        compared: &[String],
        now: DateTime<Utc>,
        changes: &mut Changes,
    ) {
        let mut open = stored;

        for (at, record) in arrivals {
            if let Some(current) = &open {
                if current.starts().is_some_and(|from| at < from) {
                    tracing::debug!(
                        effective = %at,
                        "skipping arrival older than the open version"
                    );
                    changes.skipped_late += 1;
                    continue;
                }
                if same_values(&record, current.record(), compared.iter().map(String::as_str)) {
                    changes.unchanged += 1;
                    continue;
                }
            }

            match open.take() {
                Some(Open::Stored { record: old, .. }) => {
                    let mut closed = old.clone();
                    self.close(&mut closed, at);
                    self.enricher.touch(&mut closed, now);
                    if self.close_mode == CloseMode::Delete {
                        changes.deleted.push(old);
                    }
                    changes.closed.push(closed);
                }
                Some(Open::Arrived {
                    record: mut prev, ..
                }) => {
                    self.close(&mut prev, at);
                    changes.inserted.push(prev);
                }
                None => {}
            }

            open = Some(Open::Arrived {
                record: self.open(record, at),
                from: at,
            });
        }

        if let Some(Open::Arrived { record, .. }) = open {
            changes.inserted.push(record);
        }
    }

    fn open(&self, mut record: Record, at: DateTime<Utc>) -> Record {
        record.set(self.effective_from.as_str(), at);
        record.set(self.effective_to.as_str(), far_future());
        if let Some(flag) = &self.current_flag {
            record.set(flag.as_str(), true);
        }
        record
    }

    fn close(&self, record: &mut Record, at: DateTime<Utc>) {
        record.set(self.effective_to.as_str(), at);
        if let Some(flag) = &self.current_flag {
            record.set(flag.as_str(), false);
        }
    }

    /// Fields whose values decide whether an arrival is a new version.
    fn compared_fields(&self, schema: &Schema) -> Result<Vec<String>> {
        if let Some(fields) = &self.value_fields {
            if let Some(missing) = fields.iter().find(|f| !schema.contains(f)) {
                return Err(Error::SchemaMismatch {
                    context: ARRIVING_BATCH.to_string(),
                    expected: format!("value field '{}'", missing),
                    got: schema.to_string(),
                });
            }
            return Ok(fields.clone());
        }

        let excluded: Vec<&str> = self
            .key_fields
            .iter()
            .map(String::as_str)
            .chain([self.effective_from.as_str(), self.effective_to.as_str()])
            .chain(self.current_flag.as_deref())
            .chain(self.event_time.as_deref())
            .chain(self.enricher.last_updated_field())
            .collect();

        Ok(schema
            .fields
            .iter()
            .filter(|f| !excluded.contains(&f.name.as_str()))
            .map(|f| f.name.clone())
            .collect())
    }

    /// Group arrivals by key and order each group by effective time.
    ///
    /// Arrivals for one key sharing an effective time collapse to the last
    /// of them, so no version is opened and closed at the same instant.
    fn group_arrivals(
        &self,
        records: Vec<Record>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Key, Vec<(DateTime<Utc>, Record)>)>> {
        let mut positions: HashMap<Key, usize> = HashMap::new();
        let mut groups: Vec<(Key, Vec<(DateTime<Utc>, Record)>)> = Vec::new();

        for record in records {
            let key = key_of(&record, &self.key_fields)?;
            let at = self.effective_time(&record, now)?;
            match positions.get(&key) {
                Some(&i) => groups[i].1.push((at, record)),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, vec![(at, record)]));
                }
            }
        }

        for (_, arrivals) in &mut groups {
            arrivals.sort_by_key(|(at, _)| *at);
            // Same effective time: the later arrival replaces the earlier one
            arrivals.dedup_by(|later, kept| {
                let same = later.0 == kept.0;
                if same {
                    std::mem::swap(later, kept);
                }
                same
            });
        }
        Ok(groups)
    }

    fn effective_time(&self, record: &Record, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let Some(field) = &self.event_time else {
            return Ok(now);
        };
        record
            .get(field)
            .and_then(as_instant)
            .ok_or_else(|| Error::InvalidValue {
                field: field.clone(),
                reason: "expected a timestamp or epoch milliseconds".into(),
            })
    }
}

fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Int(millis) => DateTime::from_timestamp_millis(*millis),
        _ => None,
    }
}

impl Planner for HistoryPlanner {
    fn strategy_name(&self) -> &str {
        Self::NAME
    }

    fn plan_mutations_for_batch(
        &self,
        batch: &[Record],
        existing: &dyn ExistingLookup,
    ) -> Result<Plan> {
        self.plan(batch, existing)
    }

    fn emitted_mutation_types(&self) -> BTreeSet<MutationType> {
        match self.close_mode {
            CloseMode::Update => BTreeSet::from([MutationType::Insert, MutationType::Update]),
            CloseMode::Delete => BTreeSet::from([MutationType::Insert, MutationType::Delete]),
        }
    }
}
