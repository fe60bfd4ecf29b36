//! Append planning: every arriving record becomes an INSERT.

use super::{Capabilities, Planner, ARRIVING_BATCH};
use crate::{
    error::Result, Enricher, ExistingLookup, MutationType, Plan, PlannerConfig, Record, Schema,
};
use std::collections::BTreeSet;

/// Plans pure inserts for streams without update or delete semantics.
///
/// No key comparison happens, so any (uniform) schema is accepted.
#[derive(Debug, Clone)]
pub struct AppendPlanner {
    enricher: Enricher,
}

impl AppendPlanner {
    pub const NAME: &'static str = "append";

    pub fn new(config: &PlannerConfig, caps: &Capabilities) -> Self {
        Self {
            enricher: Enricher::new(config, caps.clock.clone(), caps.keys.clone()),
        }
    }

    /// Plan a batch. Records keep their arrival order.
    pub fn plan(&self, batch: &[Record]) -> Result<Plan> {
        Schema::of_batch(batch, ARRIVING_BATCH)?;
        let enriched = self.enricher.enrich(batch)?;

        let mut plan = Plan::new();
        plan.push(MutationType::Insert, enriched)?;

        tracing::debug!(
            strategy = Self::NAME,
            records = plan.record_count(),
            "planned batch"
        );
        Ok(plan)
    }
}

impl Planner for AppendPlanner {
    fn strategy_name(&self) -> &str {
        Self::NAME
    }

    fn plan_mutations_for_batch(
        &self,
        batch: &[Record],
        _existing: &dyn ExistingLookup,
    ) -> Result<Plan> {
        self.plan(batch)
    }

    fn emitted_mutation_types(&self) -> BTreeSet<MutationType> {
        BTreeSet::from([MutationType::Insert])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, Error, FixedClock, SequentialKeyGenerator, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn planner(options: serde_json::Value) -> AppendPlanner {
        let config = PlannerConfig::from_json(&options).unwrap();
        let caps = Capabilities::new(
            Arc::new(FixedClock::from_millis(0)),
            Arc::new(SequentialKeyGenerator::new("uuid-")),
        );
        AppendPlanner::new(&config, &caps)
    }

    #[test]
    fn single_insert_in_arrival_order() {
        let planner = planner(json!({"strategy": "append"}));
        let batch: Vec<_> = (0..5).map(|i| Record::new().with("v", i)).collect();

        let plan = planner.plan(&batch).unwrap();
        assert_eq!(plan.kinds(), vec![MutationType::Insert]);
        assert_eq!(plan.mutations()[0].records(), batch.as_slice());
    }

    #[test]
    fn empty_batch_plans_nothing() {
        let planner = planner(json!({"strategy": "append"}));
        assert!(planner.plan(&[]).unwrap().is_empty());
    }

    #[test]
    fn synthetic_key_scenario() {
        let planner = planner(json!({
            "strategy": "append",
            "uuid.key.enabled": true,
            "fields.key": ["id"]
        }));
        let batch = vec![Record::new().with("id", Value::Null).with("v", 5)];

        let plan = planner.plan(&batch).unwrap();
        let record = &plan.mutations()[0].records()[0];
        assert_eq!(record.get("id"), Some(&Value::from("uuid-1")));
        assert_eq!(record.get("v"), Some(&Value::Int(5)));
    }

    #[test]
    fn synthetic_key_without_key_fields() {
        let planner = planner(json!({"strategy": "append", "uuid.key.enabled": true}));
        let result = planner.plan(&[Record::new().with("v", 1)]);
        assert_eq!(
            result,
            Err(Error::Configuration(
                ConfigError::SyntheticKeyWithoutKeyFields
            ))
        );
    }

    #[test]
    fn emits_only_inserts() {
        let planner = planner(json!({"strategy": "append"}));
        assert_eq!(
            planner.emitted_mutation_types(),
            BTreeSet::from([MutationType::Insert])
        );
    }
}
