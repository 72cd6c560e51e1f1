use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::api::models::{HistoryQuery, HistoryResponse, ReadingResponse};
use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::Result;
use crate::models::{PatientId, TemperatureSample};

pub async fn get_latest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<TemperatureSample>>> {
    Ok(Json(state.dashboard.latest(&user.subject).await?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let history = state
        .dashboard
        .history(&user.subject, patient_id, query.hours, Utc::now())
        .await?;
    Ok(Json(history.into()))
}

/// Readings of the whole roster inside the lookback window, for the chart.
pub async fn get_readings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ReadingResponse>>> {
    let readings = state
        .dashboard
        .readings(&user.subject, query.hours, Utc::now())
        .await?;
    Ok(Json(readings.into_iter().map(ReadingResponse::from).collect()))
}
