//! Per-table planners, built once at start-up from the planners file.
//!
//! ```json
//! {
//!   "tables": {
//!     "customers": { "strategy": "upsert", "fields.key": ["id"] },
//!     "events":    { "strategy": "append" }
//!   }
//! }
//! ```

use serde::Deserialize;
use sluice_engine::{
    far_future, Capabilities, HistoryPlanner, MutationType, Planner, PlannerConfig,
    PlannerOptions, PlannerRegistry, Record, Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// A configured table and the planner serving it.
#[derive(Debug)]
pub struct Table {
    name: String,
    planner: Box<dyn Planner>,
    key_fields: Vec<String>,
    /// Effective-to field of history tables; its far-future value marks open rows
    open_marker: Option<String>,
}

impl Table {
    pub fn build(
        name: &str,
        options: &PlannerOptions,
        registry: &PlannerRegistry,
        caps: &Capabilities,
    ) -> Result<Self, sluice_engine::Error> {
        let config = PlannerConfig::resolve(options)?;
        let planner = registry.build_from_config(&config, caps)?;
        let open_marker = if config.strategy() == HistoryPlanner::NAME {
            config.history().effective_to.clone()
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            planner,
            key_fields: config.key_fields().to_vec(),
            open_marker,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn planner(&self) -> &dyn Planner {
        self.planner.as_ref()
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn mutation_types(&self) -> BTreeSet<MutationType> {
        self.planner.emitted_mutation_types()
    }

    /// Whether a planned record is the open row for its key once written.
    pub fn is_open(&self, record: &Record) -> bool {
        match &self.open_marker {
            Some(field) => record.get(field) == Some(&Value::from(far_future())),
            None => true,
        }
    }

    /// Storage key of a record: its key values as a JSON array.
    ///
    /// Tables without key fields store every row under `[]`.
    pub fn row_key(&self, record: &Record) -> serde_json::Value {
        record
            .key(&self.key_fields)
            .map(|key| key.to_json())
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()))
    }
}

#[derive(Debug, Deserialize)]
struct PlannersFile {
    tables: BTreeMap<String, PlannerOptions>,
}

/// All configured tables, by name.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: HashMap<String, Arc<Table>>,
}

impl Tables {
    /// Read and build every table in a planners file.
    pub fn load(path: &Path) -> Result<Self, TablesError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TablesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&serde_json::from_str(&raw)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, TablesError> {
        let file: PlannersFile = serde_json::from_value(value.clone())?;
        let registry = PlannerRegistry::with_defaults();
        let caps = Capabilities::default();

        let mut tables = HashMap::with_capacity(file.tables.len());
        for (name, options) in &file.tables {
            let table = Table::build(name, options, &registry, &caps).map_err(|source| {
                TablesError::Planner {
                    table: name.clone(),
                    source,
                }
            })?;
            tracing::info!(
                table = %name,
                strategy = table.planner().strategy_name(),
                "configured table"
            );
            tables.insert(name.clone(), Arc::new(table));
        }

        Ok(Self { tables })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    /// Table names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Errors loading the planners file.
#[derive(Debug, thiserror::Error)]
pub enum TablesError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid planners file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Table '{table}': {source}")]
    Planner {
        table: String,
        #[source]
        source: sluice_engine::Error,
    },
}
