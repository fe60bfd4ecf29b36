//! Table routes: metadata, planning and application.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::handlers::{
    handle_apply, handle_describe_table, handle_list_tables, handle_plan, PlanRequest,
    PlanResponse, TableInfo,
};
use crate::AppState;

/// Create table routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list_handler))
        .route("/tables/{table}", get(describe_handler))
        .route("/tables/{table}/plan", post(plan_handler))
        .route("/tables/{table}/apply", post(apply_handler))
}

/// GET /tables - List configured tables.
async fn list_handler(State(state): State<AppState>) -> Json<Vec<TableInfo>> {
    Json(handle_list_tables(&state))
}

/// GET /tables/{table} - Describe one table.
async fn describe_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableInfo>> {
    Ok(Json(handle_describe_table(&state, &table)?))
}

/// POST /tables/{table}/plan - Plan a batch.
async fn plan_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>> {
    let response = handle_plan(&state, &table, request).await?;
    Ok(Json(response))
}

/// POST /tables/{table}/apply - Plan a batch and write it.
async fn apply_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>> {
    let response = handle_apply(&state, &table, request).await?;
    Ok(Json(response))
}
