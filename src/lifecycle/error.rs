use std::fmt;
use thiserror::Error;

use crate::models::{InvalidInterval, MacAddress, PatientId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Patient(PatientId),
    Device(MacAddress),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Patient(id) => write!(f, "patient {id}"),
            Missing::Device(mac) => write!(f, "device {mac}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The device, or the patient, already takes part in an active binding.
    /// `patient_id` is `None` when the holder belongs to another account.
    #[error("device {mac_address} is bound to {}", holder(.patient_id))]
    Conflict {
        mac_address: MacAddress,
        patient_id: Option<PatientId>,
    },

    #[error("device {mac_address} is not bound to any patient")]
    NotBound { mac_address: MacAddress },

    #[error(transparent)]
    InvalidInterval(#[from] InvalidInterval),

    #[error("{0} not found")]
    NotFound(Missing),
}

fn holder(patient_id: &Option<PatientId>) -> String {
    match patient_id {
        Some(id) => format!("patient {id}"),
        None => "another patient".to_string(),
    }
}
