use serde::{Deserialize, Serialize};

use crate::lifecycle::Binding;
use crate::models::{MacAddress, PatientId, SampleInterval};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDeviceRequest {
    pub mac_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetIntervalRequest {
    pub sample_interval_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResponse {
    pub patient_id: PatientId,
    pub mac_address: Option<MacAddress>,
    pub sample_interval_seconds: Option<SampleInterval>,
    /// UNBOUND, BOUND_NO_INTERVAL or BOUND_CONFIGURED
    pub state: String,
}

impl From<Binding> for BindingResponse {
    fn from(binding: Binding) -> Self {
        Self {
            state: binding.state().label().to_string(),
            patient_id: binding.patient_id,
            mac_address: binding.mac_address,
            sample_interval_seconds: binding.sample_interval_seconds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub mac_address: MacAddress,
    pub released_from: Option<PatientId>,
}
