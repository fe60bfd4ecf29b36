//! Strategy registry: builds planners from configuration.

use crate::planner::{AppendPlanner, Capabilities, HistoryPlanner, Planner, UpsertPlanner};
use crate::{error::Result, Clock, ConfigError, KeyGenerator, PlannerConfig, PlannerOptions};
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for a strategy, given resolved configuration.
pub type PlannerBuilder = fn(&PlannerConfig, &Capabilities) -> Result<Box<dyn Planner>>;

/// Maps strategy names to planner constructors.
#[derive(Clone, Default)]
pub struct PlannerRegistry {
    builders: HashMap<String, PlannerBuilder>,
}

impl PlannerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A registry with `append`, `upsert` and `type2`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(AppendPlanner::NAME, |config, caps| {
                Ok(Box::new(AppendPlanner::new(config, caps)))
            })
            .register(UpsertPlanner::NAME, |config, caps| {
                Ok(Box::new(UpsertPlanner::new(config, caps)?))
            })
            .register(HistoryPlanner::NAME, |config, caps| {
                Ok(Box::new(HistoryPlanner::new(config, caps)?))
            });
        registry
    }

    /// Register (or replace) a strategy. Names are case-insensitive.
    pub fn register(&mut self, name: &str, builder: PlannerBuilder) -> &mut Self {
        self.builders.insert(name.to_ascii_lowercase(), builder);
        self
    }

    /// Registered strategy names, sorted.
    pub fn strategies(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve options and build the configured planner.
    pub fn build(&self, options: &PlannerOptions, caps: &Capabilities) -> Result<Box<dyn Planner>> {
        self.build_from_config(&PlannerConfig::resolve(options)?, caps)
    }

    pub fn build_from_config(
        &self,
        config: &PlannerConfig,
        caps: &Capabilities,
    ) -> Result<Box<dyn Planner>> {
        let builder = self
            .builders
            .get(config.strategy())
            .ok_or_else(|| ConfigError::UnknownStrategy(config.strategy().to_string()))?;

        let planner = builder(config, caps)?;
        tracing::debug!(
            strategy = config.strategy(),
            key_fields = ?config.key_fields(),
            "built planner"
        );
        Ok(planner)
    }
}

impl std::fmt::Debug for PlannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerRegistry")
            .field("strategies", &self.strategies())
            .finish()
    }
}

/// Build a planner with the system clock and UUID v4 synthetic keys.
pub fn build_planner(options: &PlannerOptions) -> Result<Box<dyn Planner>> {
    PlannerRegistry::with_defaults().build(options, &Capabilities::default())
}

/// Build a planner with the given time and key sources.
pub fn build_planner_with(
    options: &PlannerOptions,
    clock: Arc<dyn Clock>,
    keys: Arc<dyn KeyGenerator>,
) -> Result<Box<dyn Planner>> {
    PlannerRegistry::with_defaults().build(options, &Capabilities::new(clock, keys))
}
