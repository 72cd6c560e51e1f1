use serde::{Deserialize, Serialize};

use crate::models::{MacAddress, PatientId, SampleInterval};

/// Where a patient's binding sits in the bind → configure → reset cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Unbound,
    BoundNoInterval {
        mac_address: MacAddress,
    },
    BoundConfigured {
        mac_address: MacAddress,
        interval: SampleInterval,
    },
}

impl BindingState {
    /// Rebuilds the state from registry columns. An interval without a device
    /// carries no meaning and is dropped.
    pub fn from_parts(mac_address: Option<MacAddress>, interval: Option<SampleInterval>) -> Self {
        match (mac_address, interval) {
            (None, _) => BindingState::Unbound,
            (Some(mac_address), None) => BindingState::BoundNoInterval { mac_address },
            (Some(mac_address), Some(interval)) => BindingState::BoundConfigured {
                mac_address,
                interval,
            },
        }
    }

    pub fn mac_address(&self) -> Option<&MacAddress> {
        match self {
            BindingState::Unbound => None,
            BindingState::BoundNoInterval { mac_address }
            | BindingState::BoundConfigured { mac_address, .. } => Some(mac_address),
        }
    }

    pub fn interval(&self) -> Option<SampleInterval> {
        match self {
            BindingState::BoundConfigured { interval, .. } => Some(*interval),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, BindingState::Unbound)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BindingState::Unbound => "UNBOUND",
            BindingState::BoundNoInterval { .. } => "BOUND_NO_INTERVAL",
            BindingState::BoundConfigured { .. } => "BOUND_CONFIGURED",
        }
    }
}

/// Flat projection of a patient's binding, as exchanged with the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub patient_id: PatientId,
    pub mac_address: Option<MacAddress>,
    pub sample_interval_seconds: Option<SampleInterval>,
}

impl Binding {
    pub fn project(patient_id: PatientId, state: &BindingState) -> Self {
        Self {
            patient_id,
            mac_address: state.mac_address().cloned(),
            sample_interval_seconds: state.interval(),
        }
    }

    pub fn state(&self) -> BindingState {
        BindingState::from_parts(self.mac_address.clone(), self.sample_interval_seconds)
    }
}

/// Outbound request to the device registry. A transition yields these in the
/// order they must be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryRequest {
    Bind {
        patient_id: PatientId,
        mac_address: MacAddress,
    },
    /// Only applies while the device is still bound to `patient_id`.
    ConfigureInterval {
        mac_address: MacAddress,
        patient_id: PatientId,
        interval: SampleInterval,
    },
    /// Only applies while the device is still bound to `patient_id`.
    Release {
        mac_address: MacAddress,
        patient_id: PatientId,
    },
    RemovePatient {
        patient_id: PatientId,
    },
}
