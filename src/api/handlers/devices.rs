use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::api::models::{AssignDeviceRequest, BindingResponse, ResetResponse, SetIntervalRequest};
use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::Result;
use crate::models::{Device, MacAddress, PatientId};

pub async fn list_unassigned(State(state): State<AppState>) -> Result<Json<Vec<Device>>> {
    Ok(Json(state.binding.unassigned_devices().await?))
}

pub async fn assign_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
    Json(body): Json<AssignDeviceRequest>,
) -> Result<Json<BindingResponse>> {
    let mac_address = MacAddress::parse(&body.mac_address)?;
    let binding = state
        .binding
        .assign(&user.subject, patient_id, &mac_address)
        .await?;
    Ok(Json(binding.into()))
}

pub async fn set_interval(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(mac_address): Path<String>,
    Json(body): Json<SetIntervalRequest>,
) -> Result<Json<BindingResponse>> {
    let mac_address = MacAddress::parse(&mac_address)?;
    let binding = state
        .binding
        .set_interval(&user.subject, &mac_address, body.sample_interval_seconds)
        .await?;
    Ok(Json(binding.into()))
}

pub async fn reset_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(mac_address): Path<String>,
) -> Result<Json<ResetResponse>> {
    let mac_address = MacAddress::parse(&mac_address)?;
    let released_from = state.binding.reset(&user.subject, &mac_address).await?;

    Ok(Json(ResetResponse {
        mac_address,
        released_from,
    }))
}
