//! Plan handler - plans (and optionally applies) an arriving batch.

use crate::db::{self, PgLookup};
use crate::error::{AppError, Result};
use crate::tables::Table;
use crate::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sluice_engine::{Plan, Record};
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Request body for planning a batch.
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    /// Arriving records as flat JSON objects
    pub records: Vec<serde_json::Value>,
}

/// Response for a planned batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    /// Identifies this planning call in server logs
    pub plan_id: Uuid,
    pub table: String,
    pub strategy: String,
    pub planned_at: DateTime<Utc>,
    /// `[{"type": "...", "records": [...]}]`, in application order
    pub mutations: serde_json::Value,
    /// Rows written or removed, when the plan was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

/// Plan a batch without touching the table.
pub async fn handle_plan(
    state: &AppState,
    table_name: &str,
    request: PlanRequest,
) -> Result<PlanResponse> {
    let table = find_table(state, table_name)?;
    let batch = parse_batch(&request.records)?;
    let plan_id = Uuid::new_v4();

    let plan = plan_batch(state, table.clone(), batch).await?;
    tracing::info!(
        %plan_id,
        table = table.name(),
        mutations = plan.len(),
        records = plan.record_count(),
        "planned batch"
    );

    Ok(response(plan_id, &table, &plan, None))
}

/// Plan a batch and apply it to the table in one transaction.
pub async fn handle_apply(
    state: &AppState,
    table_name: &str,
    request: PlanRequest,
) -> Result<PlanResponse> {
    let table = find_table(state, table_name)?;
    let batch = parse_batch(&request.records)?;
    let plan_id = Uuid::new_v4();

    let plan = plan_batch(state, table.clone(), batch).await?;
    let rows_affected = db::apply_plan(&state.pool, &table, &plan).await?;
    tracing::info!(
        %plan_id,
        table = table.name(),
        mutations = plan.len(),
        rows_affected,
        "applied batch"
    );

    Ok(response(plan_id, &table, &plan, Some(rows_affected)))
}

pub(crate) fn find_table(state: &AppState, table_name: &str) -> Result<Arc<Table>> {
    state
        .tables
        .get(table_name)
        .ok_or_else(|| AppError::NotFound(format!("table '{}'", table_name)))
}

/// Convert request records, naming the first one that is not a flat object.
fn parse_batch(records: &[serde_json::Value]) -> Result<Vec<Record>> {
    records
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Record::from_json(raw).map_err(|e| AppError::BadRequest(format!("record {}: {}", i, e)))
        })
        .collect()
}

/// Run the planner on a blocking thread; its lookup blocks on the database.
async fn plan_batch(state: &AppState, table: Arc<Table>, batch: Vec<Record>) -> Result<Plan> {
    let pool = state.pool.clone();
    let timeout = state.config.lookup_timeout;
    let handle = Handle::current();

    let plan = tokio::task::spawn_blocking(move || {
        let lookup = PgLookup::new(&pool, handle, table.name(), table.key_fields(), timeout);
        table.planner().plan_mutations_for_batch(&batch, &lookup)
    })
    .await
    .map_err(|e| AppError::Internal(format!("planning task failed: {}", e)))??;

    Ok(plan)
}

fn response(plan_id: Uuid, table: &Table, plan: &Plan, rows_affected: Option<u64>) -> PlanResponse {
    PlanResponse {
        plan_id,
        table: table.name().to_string(),
        strategy: table.planner().strategy_name().to_string(),
        planned_at: Utc::now(),
        mutations: plan.to_json(),
        rows_affected,
    }
}
