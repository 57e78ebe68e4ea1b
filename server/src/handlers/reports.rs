use axum::{
    extract::{Path, Query, State},
    response::Response,
};

use crate::middleware::AdminOnly;
use crate::models::PageParams;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn summary_report(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let report = state.reports.summary(params.into()).await?;
    Ok(success(report, "Summary report retrieved successfully"))
}

pub async fn event_report(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let report = state.reports.event_report(id, params.into()).await?;
    Ok(success(report, "Event report retrieved successfully"))
}
