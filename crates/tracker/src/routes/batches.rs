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
    extract::{ValidPath, ValidQuery, parse_batch},
};
use crate::{
    AppState,
    auth::RequestContext,
    services::{
        BatchService, BatchServiceError,
        batches::{BatchDetailView, BatchListView, BatchRolesView, DailySummary},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batches", get(list_batches))
        .route("/batches/summary/daily", get(daily_summary))
        .route("/batches/{batch}", get(batch_detail))
        .route("/batches/{batch}/roles", get(batch_roles))
        .route("/batches/{batch}/initialize", post(initialize_batch))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub operation_date: NaiveDate,
}

/// Adds the leading `success` flag the dashboard expects.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

async fn list_batches(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidQuery(query): ValidQuery<DateQuery>,
) -> Result<Json<Success<BatchListView>>, ApiError> {
    let view = BatchService::new(state.pool(), state.clock())
        .list(query.operation_date)
        .await?;
    Ok(Success::new(view))
}

async fn batch_detail(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidPath(batch): ValidPath<String>,
    ValidQuery(query): ValidQuery<DateQuery>,
) -> Result<Json<Success<BatchDetailView>>, ApiError> {
    let batch = parse_batch(&batch)?;
    let view = BatchService::new(state.pool(), state.clock())
        .detail(query.operation_date, batch)
        .await?;
    Ok(Success::new(view))
}

async fn batch_roles(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidPath(batch): ValidPath<String>,
    ValidQuery(query): ValidQuery<DateQuery>,
) -> Result<Json<Success<BatchRolesView>>, ApiError> {
    let batch = parse_batch(&batch)?;
    let view = BatchService::new(state.pool(), state.clock())
        .with_roles(query.operation_date, batch)
        .await?;
    Ok(Success::new(view))
}

async fn daily_summary(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    ValidQuery(query): ValidQuery<DateQuery>,
) -> Result<Json<DailySummary>, ApiError> {
    let summary = BatchService::new(state.pool(), state.clock())
        .daily_summary(query.operation_date)
        .await?;
    Ok(Json(summary))
}

#[instrument(name = "batches.initialize", skip(state, ctx, query), fields(user_id = %ctx.user.id))]
async fn initialize_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidPath(batch): ValidPath<String>,
    ValidQuery(query): ValidQuery<DateQuery>,
) -> Result<Json<Success<BatchRolesView>>, ApiError> {
    let batch = parse_batch(&batch)?;
    let view = BatchService::new(state.pool(), state.clock())
        .initialize(query.operation_date, batch)
        .await
        .map_err(|error| match error {
            BatchServiceError::NotAvailable { batch, date } => {
                ApiError::batch_not_available(batch, date)
            }
            other => other.into(),
        })?;
    Ok(Success::new(view))
}
