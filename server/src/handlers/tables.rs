//! Table handlers - describe configured tables.

use super::plan::find_table;
use crate::error::Result;
use crate::tables::Table;
use crate::AppState;
use serde::Serialize;
use sluice_engine::MutationType;

/// What a table's planner does.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub strategy: String,
    pub key_fields: Vec<String>,
    /// Every mutation type the planner can emit
    pub mutation_types: Vec<MutationType>,
}

impl From<&Table> for TableInfo {
    fn from(table: &Table) -> Self {
        Self {
            name: table.name().to_string(),
            strategy: table.planner().strategy_name().to_string(),
            key_fields: table.key_fields().to_vec(),
            mutation_types: table.mutation_types().into_iter().collect(),
        }
    }
}

/// List all configured tables.
pub fn handle_list_tables(state: &AppState) -> Vec<TableInfo> {
    state
        .tables
        .names()
        .into_iter()
        .filter_map(|name| state.tables.get(name))
        .map(|table| TableInfo::from(table.as_ref()))
        .collect()
}

/// Describe one table.
pub fn handle_describe_table(state: &AppState, table_name: &str) -> Result<TableInfo> {
    let table = find_table(state, table_name)?;
    Ok(TableInfo::from(table.as_ref()))
}
