use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::BindingResponse;
use crate::engine::TriageRange;
use crate::models::{MacAddress, Patient, PatientId};
use crate::services::PatientStatus;

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub age: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverviewQuery {
    #[serde(default)]
    pub range: TriageRange,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    pub patient_id: PatientId,
    pub name: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Patient> for PatientResponse {
    fn from(patient: Patient) -> Self {
        Self {
            patient_id: patient.patient_id,
            name: patient.name,
            age: patient.age,
            created_at: patient.created_at,
        }
    }
}

/// Roster row on the dashboard.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: PatientResponse,
    pub latest_temperature_c: Option<f64>,
    pub latest_recorded_at: Option<DateTime<Utc>>,
    /// Band the latest reading falls in; absent between bands or without a reading.
    pub range: Option<TriageRange>,
}

impl From<PatientStatus> for PatientSummary {
    fn from(status: PatientStatus) -> Self {
        Self {
            patient: status.patient.into(),
            latest_temperature_c: status.latest.map(|s| s.temperature_c),
            latest_recorded_at: status.latest.map(|s| s.timestamp),
            range: status.range,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: PatientResponse,
    pub binding: BindingResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePatientResponse {
    pub patient_id: PatientId,
    pub released_mac_address: Option<MacAddress>,
}
