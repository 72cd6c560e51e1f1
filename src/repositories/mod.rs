//! Boundary contracts to the external stores, with a Postgres implementation
//! of each and an in-memory one that implements all three.

pub mod memory;
pub mod patients;
pub mod registry;
pub mod temperature;

pub use memory::MemoryStore;
pub use patients::PgPatientStore;
pub use registry::PgDeviceRegistry;
pub use temperature::PgSampleStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::lifecycle::{RegistryRequest, RegistrySnapshot};
use crate::models::{Device, MacAddress, NewPatient, Patient, PatientId, TemperatureSample};

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn list(&self, owner_id: &str) -> Result<Vec<Patient>>;

    /// Patients registered by another account are reported as missing.
    async fn get(&self, owner_id: &str, patient_id: PatientId) -> Result<Patient>;

    async fn create(&self, owner_id: &str, patient: &NewPatient) -> Result<Patient>;
}

/// Which rows a lifecycle transition needs to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryScope {
    pub patients: Vec<PatientId>,
    pub devices: Vec<MacAddress>,
}

impl RegistryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient(mut self, patient_id: PatientId) -> Self {
        self.patients.push(patient_id);
        self
    }

    pub fn device(mut self, mac_address: MacAddress) -> Self {
        self.devices.push(mac_address);
        self
    }
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Devices in scope and every device bound to a patient in scope, plus
    /// the existing patients among those in scope or bound to a scoped device.
    async fn snapshot(&self, scope: &RegistryScope) -> Result<RegistrySnapshot>;

    async fn unassigned(&self) -> Result<Vec<Device>>;

    /// Applies the requests in order, all or nothing.
    async fn apply(&self, requests: &[RegistryRequest]) -> Result<()>;
}

#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Every sample recorded for the account's current patients.
    async fn for_owner(&self, owner_id: &str) -> Result<Vec<TemperatureSample>>;

    /// Samples for one patient recorded at or after `since`, oldest first.
    async fn for_patient(
        &self,
        patient_id: PatientId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TemperatureSample>>;
}
