use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use crate::api::models::{
    BindingResponse, CreatePatientRequest, DeletePatientResponse, OverviewQuery, PatientDetail,
    PatientResponse, PatientSummary,
};
use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::Result;
use crate::models::{NewPatient, PatientId};

pub async fn list_patients(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<Vec<PatientSummary>>> {
    let rows = state.dashboard.overview(&user.subject, query.range).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_patient(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<PatientResponse>)> {
    let patient = NewPatient::parse(&body.name, body.age)?;
    let created = state.patients.create(&user.subject, &patient).await?;

    info!(patient_id = %created.patient_id, owner = %user.subject, "patient registered");
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<PatientDetail>> {
    let patient = state.patients.get(&user.subject, patient_id).await?;
    let binding = state.binding.binding(&user.subject, patient_id).await?;

    Ok(Json(PatientDetail {
        patient: patient.into(),
        binding: binding.into(),
    }))
}

pub async fn get_binding(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<BindingResponse>> {
    let binding = state.binding.binding(&user.subject, patient_id).await?;
    Ok(Json(binding.into()))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<DeletePatientResponse>> {
    let released = state.binding.delete_patient(&user.subject, patient_id).await?;

    Ok(Json(DeletePatientResponse {
        patient_id,
        released_mac_address: released,
    }))
}
