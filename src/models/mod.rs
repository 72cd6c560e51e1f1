pub mod device;
pub mod patient;
pub mod temperature;

pub use device::{Device, InvalidInterval, MacAddress, SampleInterval};
pub use patient::{NewPatient, Patient, PatientId};
pub use temperature::TemperatureSample;

use thiserror::Error;

/// Rejected input at the data-model boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("age must be a non-negative integer, got {0}")]
    InvalidAge(i64),
    #[error("invalid MAC address: {0:?}")]
    InvalidMacAddress(String),
}
