use axum::{
    Json, Router,
    extract::{Extension, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{
    error::ApiError,
    extract::{ValidJson, ValidPath, ValidQuery, parse_batch, parse_role},
};
use crate::{
    AppState,
    auth::RequestContext,
    services::{
        OperationService,
        operations::{OperationOutcome, OperationView, PreviousRoleCheck},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/operations/start", post(start_operation))
        .route("/operations/end", post(end_operation))
        .route("/operations/end-driver", post(end_driver_operation))
        .route("/operations/check-previous", get(check_previous))
        .route(
            "/operations/{operation_date}/{batch}/{role}",
            get(get_operation),
        )
}

/// Body of `/start` and `/end`, also the `check-previous` query.
#[derive(Debug, Deserialize)]
pub struct OperationKeyRequest {
    pub operation_date: NaiveDate,
    pub batch: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct DriverEndRequest {
    pub operation_date: NaiveDate,
    pub batch: String,
    pub total_orders: i32,
    pub on_time_deliveries: i32,
}

#[derive(Debug, Serialize)]
pub struct OperationTransitionResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: OperationView,
    pub warning: Option<String>,
}

impl OperationTransitionResponse {
    fn new(outcome: OperationOutcome, message: &'static str) -> Self {
        Self {
            success: true,
            message,
            data: outcome.operation,
            warning: outcome.warning,
        }
    }
}

#[instrument(
    name = "operations.start_handler",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
async fn start_operation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidJson(payload): ValidJson<OperationKeyRequest>,
) -> Result<Json<OperationTransitionResponse>, ApiError> {
    let batch = parse_batch(&payload.batch)?;
    let role = parse_role(&payload.role)?;

    let outcome = OperationService::new(state.pool(), state.clock())
        .start(payload.operation_date, batch, role, &ctx.user)
        .await?;

    Ok(Json(OperationTransitionResponse::new(
        outcome,
        "Operation started successfully",
    )))
}

#[instrument(
    name = "operations.end_handler",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
async fn end_operation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidJson(payload): ValidJson<OperationKeyRequest>,
) -> Result<Json<OperationTransitionResponse>, ApiError> {
    let batch = parse_batch(&payload.batch)?;
    let role = parse_role(&payload.role)?;

    let outcome = OperationService::new(state.pool(), state.clock())
        .end(payload.operation_date, batch, role, &ctx.user)
        .await?;

    Ok(Json(OperationTransitionResponse::new(
        outcome,
        "Operation completed successfully",
    )))
}

#[instrument(
    name = "operations.end_driver_handler",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
async fn end_driver_operation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidJson(payload): ValidJson<DriverEndRequest>,
) -> Result<Json<OperationTransitionResponse>, ApiError> {
    let batch = parse_batch(&payload.batch)?;

    let outcome = OperationService::new(state.pool(), state.clock())
        .end_driver(
            payload.operation_date,
            batch,
            payload.total_orders,
            payload.on_time_deliveries,
            &ctx.user,
        )
        .await?;

    Ok(Json(OperationTransitionResponse::new(
        outcome,
        "Operation completed successfully",
    )))
}

async fn check_previous(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidQuery(query): ValidQuery<OperationKeyRequest>,
) -> Result<Json<PreviousRoleCheck>, ApiError> {
    let batch = parse_batch(&query.batch)?;
    let role = parse_role(&query.role)?;

    let check = OperationService::new(state.pool(), state.clock())
        .check_previous(query.operation_date, batch, role)
        .await?;
    Ok(Json(check))
}

async fn get_operation(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidPath((operation_date, batch, role)): ValidPath<(NaiveDate, String, String)>,
) -> Result<Json<OperationView>, ApiError> {
    let batch = parse_batch(&batch)?;
    let role = parse_role(&role)?;

    let operation = OperationService::new(state.pool(), state.clock())
        .get(operation_date, batch, role)
        .await?;
    Ok(Json(operation))
}
