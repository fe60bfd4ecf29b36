//! Mutation types emitted by planners.
//!
//! Planners never touch storage. They describe what should happen as an
//! ordered [`Plan`] of [`Mutation`]s, each a batch of records sharing one
//! [`MutationType`], and leave application to the caller.

use crate::{error::Result, Record, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change a mutation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationType {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationType::Insert => write!(f, "INSERT"),
            MutationType::Update => write!(f, "UPDATE"),
            MutationType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A non-empty batch of records to apply with one mutation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(rename = "type")]
    kind: MutationType,
    records: Vec<Record>,
}

impl Mutation {
    /// Create a mutation.
    ///
    /// Returns `Ok(None)` for an empty record set and fails if the records
    /// do not share a schema.
    pub fn new(kind: MutationType, records: Vec<Record>) -> Result<Option<Self>> {
        let context = format!("{} mutation", kind);
        if Schema::of_batch(&records, &context)?.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { kind, records }))
    }

    pub fn kind(&self) -> MutationType {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; empty mutations are never constructed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Render as `{"type": "...", "records": [...]}` with plain JSON records.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.kind,
            "records": self.records.iter().map(Record::to_json).collect::<Vec<_>>(),
        })
    }
}

/// The ordered output of a single planning call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    mutations: Vec<Mutation>,
}

impl Plan {
    pub fn new() -> Self {
        Self {
            mutations: Vec::new(),
        }
    }

    /// Append a mutation. Empty record sets are dropped.
    pub fn push(&mut self, kind: MutationType, records: Vec<Record>) -> Result<()> {
        if let Some(mutation) = Mutation::new(kind, records)? {
            self.mutations.push(mutation);
        }
        Ok(())
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Mutations of one type, in emission order.
    pub fn of_type(&self, kind: MutationType) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter().filter(move |m| m.kind == kind)
    }

    /// Mutation types in emission order.
    pub fn kinds(&self) -> Vec<MutationType> {
        self.mutations.iter().map(|m| m.kind).collect()
    }

    /// Total number of records across all mutations.
    pub fn record_count(&self) -> usize {
        self.mutations.iter().map(Mutation::len).sum()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.mutations.iter().map(Mutation::to_json).collect())
    }
}

impl IntoIterator for Plan {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}
