//! # Sluice Engine
//!
//! Mutation planning for streaming table ingestion.
//!
//! Given a batch of arriving records, and for stateful strategies a way to
//! fetch the matching records already stored, a planner decides how the
//! batch should be applied to the target table and returns that decision as
//! an ordered [`Plan`] of INSERT / UPDATE / DELETE mutations. Planning is
//! deterministic: the same inputs, clock and key source always produce the
//! same plan.
//!
//! ## Design Principles
//!
//! - **No IO**: existing state is reached only through [`ExistingLookup`]
//! - **All or nothing**: a planning call returns a complete plan or an error
//! - **Injected time and ids**: [`Clock`] and [`KeyGenerator`] are capabilities
//! - **Immutable planners**: configuration is resolved once; planners are `Send + Sync`
//!
//! ## Strategies
//!
//! - `append` ([`AppendPlanner`]) - INSERT every record
//! - `upsert` ([`UpsertPlanner`]) - UPDATE stored keys, INSERT new ones
//! - `type2` ([`HistoryPlanner`]) - close changed versions, open new ones
//!
//! ## Quick Start
//!
//! ```rust
//! use sluice_engine::{
//!     build_planner, InMemoryLookup, MutationType, PlannerOptions, Record,
//! };
//! use serde_json::json;
//!
//! // 1. Configure a planner
//! let options = PlannerOptions::from_json(&json!({
//!     "strategy": "upsert",
//!     "fields.key": ["id"]
//! }))
//! .unwrap();
//! let planner = build_planner(&options).unwrap();
//!
//! // 2. Describe what is already stored
//! let existing = InMemoryLookup::new(
//!     &["id".to_string()],
//!     vec![Record::new().with("id", 1).with("name", "a")],
//! );
//!
//! // 3. Plan a batch
//! let batch = vec![
//!     Record::new().with("id", 1).with("name", "b"),
//!     Record::new().with("id", 2).with("name", "c"),
//! ];
//! let plan = planner.plan_mutations_for_batch(&batch, &existing).unwrap();
//!
//! assert_eq!(plan.kinds(), vec![MutationType::Update, MutationType::Insert]);
//! ```

pub mod clock;
pub mod config;
pub mod enrich;
pub mod error;
pub mod lookup;
pub mod mutation;
pub mod planner;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

// Re-export main types at crate root
pub use clock::{Clock, FixedClock, KeyGenerator, SequentialKeyGenerator, SystemClock, UuidKeyGenerator};
pub use config::{CloseMode, Flag, HistoryFields, PlannerConfig, PlannerOptions};
pub use enrich::Enricher;
pub use error::{ConfigError, Error, LookupError};
pub use lookup::{ExistingLookup, InMemoryLookup, NoExisting};
pub use mutation::{Mutation, MutationType, Plan};
pub use planner::{far_future, AppendPlanner, Capabilities, HistoryPlanner, Planner, UpsertPlanner};
pub use record::{Key, Record};
pub use registry::{build_planner, build_planner_with, PlannerBuilder, PlannerRegistry};
pub use schema::{FieldDef, Schema};
pub use value::{FieldType, Value};
