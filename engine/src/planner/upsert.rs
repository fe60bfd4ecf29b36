//! Upsert planning: UPDATE keys already stored, INSERT the rest.

use super::{latest_by_key, require_key_fields, same_values, Capabilities, Planner, ARRIVING_BATCH};
use crate::{
    error::Result, lookup::fetch_existing, Enricher, ExistingLookup, MutationType, Plan,
    PlannerConfig, Record, Schema,
};
use std::collections::BTreeSet;

/// Reconciles arriving records with stored records sharing their key.
///
/// Duplicate keys within one batch are resolved last-arrival-wins: the
/// record that comes later in the batch replaces earlier ones, while the key
/// keeps the position where it first appeared.
///
/// Matched keys are always emitted under UPDATE, even when the arriving
/// record equals the stored one. Re-planning a batch against the state it
/// produced therefore yields the same UPDATE count, but applying it changes
/// no field.
#[derive(Debug, Clone)]
pub struct UpsertPlanner {
    key_fields: Vec<String>,
    enricher: Enricher,
}

impl UpsertPlanner {
    pub const NAME: &'static str = "upsert";

    /// Fails without key fields.
    pub fn new(config: &PlannerConfig, caps: &Capabilities) -> Result<Self> {
        Ok(Self {
            key_fields: require_key_fields(config, Self::NAME)?,
            enricher: Enricher::new(config, caps.clock.clone(), caps.keys.clone()),
        })
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn plan(&self, batch: &[Record], existing: &dyn ExistingLookup) -> Result<Plan> {
        let schema = Schema::of_batch(batch, ARRIVING_BATCH)?;
        let enriched = self.enricher.enrich(batch)?;
        let latest = latest_by_key(enriched, &self.key_fields)?;

        let keys: BTreeSet<_> = latest.iter().map(|(key, _)| key.clone()).collect();
        let found = fetch_existing(existing, &keys, &self.key_fields)?;
        if let Some(schema) = &schema {
            let stamp = self.enricher.last_updated_field();
            let compared: Vec<&str> = schema
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .filter(|f| Some(*f) != stamp && !self.key_fields.iter().any(|k| k == f))
                .collect();
            for current in found.values() {
                schema.check_comparable(current, compared.iter().copied(), "existing record")?;
            }
        }

        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        let mut unchanged = 0usize;
        for (key, record) in latest {
            match found.get(&key) {
                Some(current) => {
                    if self.is_unchanged(&record, current) {
                        unchanged += 1;
                    }
                    updates.push(record);
                }
                None => inserts.push(record),
            }
        }

        let mut plan = Plan::new();
        plan.push(MutationType::Update, updates)?;
        plan.push(MutationType::Insert, inserts)?;

        tracing::debug!(
            strategy = Self::NAME,
            arriving = batch.len(),
            keys = keys.len(),
            updates = plan.of_type(MutationType::Update).map(|m| m.len()).sum::<usize>(),
            inserts = plan.of_type(MutationType::Insert).map(|m| m.len()).sum::<usize>(),
            unchanged,
            "planned batch"
        );
        Ok(plan)
    }

    /// Whether applying `arriving` over `current` would change any field
    /// other than the last-updated stamp.
    fn is_unchanged(&self, arriving: &Record, current: &Record) -> bool {
        let stamp = self.enricher.last_updated_field();
        let compared = |r: &Record| r.field_names().filter(|f| Some(*f) != stamp).count();

        compared(arriving) == compared(current)
            && same_values(
                arriving,
                current,
                arriving.field_names().filter(|f| Some(*f) != stamp),
            )
    }
}

impl Planner for UpsertPlanner {
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
        BTreeSet::from([MutationType::Insert, MutationType::Update])
    }
}
