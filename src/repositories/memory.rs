use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DeviceRegistry, PatientStore, RegistryScope, SampleStore};
use crate::error::Result;
use crate::lifecycle::{LifecycleError, Missing, RegistryRequest, RegistrySnapshot};
use crate::models::{Device, MacAddress, NewPatient, Patient, PatientId, TemperatureSample};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_patient_id: i64,
    patients: BTreeMap<PatientId, Patient>,
    devices: BTreeMap<MacAddress, Device>,
    samples: Vec<TemperatureSample>,
}

impl MemoryState {
    fn apply(&mut self, request: &RegistryRequest) -> Result<()> {
        match request {
            RegistryRequest::Bind {
                patient_id,
                mac_address,
            } => {
                if !self.patients.contains_key(patient_id) {
                    return Err(LifecycleError::NotFound(Missing::Patient(*patient_id)).into());
                }
                if self
                    .devices
                    .values()
                    .any(|d| d.patient_id == Some(*patient_id))
                {
                    return Err(LifecycleError::Conflict {
                        mac_address: mac_address.clone(),
                        patient_id: Some(*patient_id),
                    }
                    .into());
                }
                let device = self.device_mut(mac_address)?;
                if let Some(owner) = device.patient_id {
                    return Err(LifecycleError::Conflict {
                        mac_address: mac_address.clone(),
                        patient_id: Some(owner),
                    }
                    .into());
                }
                device.patient_id = Some(*patient_id);
                device.sample_interval_seconds = None;
            }
            RegistryRequest::ConfigureInterval {
                mac_address,
                patient_id,
                interval,
            } => {
                let device = self.bound_device_mut(mac_address, *patient_id)?;
                device.sample_interval_seconds = Some(*interval);
            }
            RegistryRequest::Release {
                mac_address,
                patient_id,
            } => {
                let device = self.bound_device_mut(mac_address, *patient_id)?;
                device.patient_id = None;
                device.sample_interval_seconds = None;
            }
            RegistryRequest::RemovePatient { patient_id } => {
                if self.patients.remove(patient_id).is_none() {
                    return Err(LifecycleError::NotFound(Missing::Patient(*patient_id)).into());
                }
            }
        }
        Ok(())
    }

    fn device_mut(&mut self, mac_address: &MacAddress) -> Result<&mut Device> {
        self.devices
            .get_mut(mac_address)
            .ok_or_else(|| LifecycleError::NotFound(Missing::Device(mac_address.clone())).into())
    }

    /// The device, provided it is still bound to `patient_id`.
    fn bound_device_mut(
        &mut self,
        mac_address: &MacAddress,
        patient_id: PatientId,
    ) -> Result<&mut Device> {
        let device = self.device_mut(mac_address)?;
        match device.patient_id {
            Some(owner) if owner == patient_id => Ok(device),
            Some(owner) => Err(LifecycleError::Conflict {
                mac_address: mac_address.clone(),
                patient_id: Some(owner),
            }
            .into()),
            None => Err(LifecycleError::NotBound {
                mac_address: mac_address.clone(),
            }
            .into()),
        }
    }
}

/// All three stores behind one lock, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device to the unassigned pool. Existing devices are left as they are.
    pub fn provision_device(&self, mac_address: MacAddress) {
        self.lock()
            .devices
            .entry(mac_address.clone())
            .or_insert_with(|| Device::unbound(mac_address));
    }

    pub fn record_sample(&self, sample: TemperatureSample) {
        self.lock().samples.push(sample);
    }

    pub fn device(&self, mac_address: &MacAddress) -> Option<Device> {
        self.lock().devices.get(mac_address).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<Patient>> {
        Ok(self
            .lock()
            .patients
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get(&self, owner_id: &str, patient_id: PatientId) -> Result<Patient> {
        self.lock()
            .patients
            .get(&patient_id)
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(Missing::Patient(patient_id)).into())
    }

    async fn create(&self, owner_id: &str, patient: &NewPatient) -> Result<Patient> {
        let mut state = self.lock();
        state.last_patient_id += 1;
        let created = Patient {
            patient_id: PatientId(state.last_patient_id),
            owner_id: owner_id.to_string(),
            name: patient.name.clone(),
            age: patient.age,
            created_at: Utc::now(),
        };
        state.patients.insert(created.patient_id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl DeviceRegistry for MemoryStore {
    async fn snapshot(&self, scope: &RegistryScope) -> Result<RegistrySnapshot> {
        let state = self.lock();

        let mut patients: Vec<PatientId> = scope
            .patients
            .iter()
            .copied()
            .filter(|id| state.patients.contains_key(id))
            .collect();
        for mac_address in &scope.devices {
            if let Some(owner) = state.devices.get(mac_address).and_then(|d| d.patient_id) {
                if !patients.contains(&owner) {
                    patients.push(owner);
                }
            }
        }
        let devices = state
            .devices
            .values()
            .filter(|d| {
                scope.devices.contains(&d.mac_address)
                    || d.patient_id.is_some_and(|id| scope.patients.contains(&id))
            })
            .cloned()
            .collect();

        Ok(RegistrySnapshot { patients, devices })
    }

    async fn unassigned(&self) -> Result<Vec<Device>> {
        Ok(self
            .lock()
            .devices
            .values()
            .filter(|d| d.patient_id.is_none())
            .cloned()
            .collect())
    }

    async fn apply(&self, requests: &[RegistryRequest]) -> Result<()> {
        let mut state = self.lock();

        let mut staged = state.clone();
        for request in requests {
            staged.apply(request)?;
        }
        *state = staged;

        Ok(())
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn for_owner(&self, owner_id: &str) -> Result<Vec<TemperatureSample>> {
        let state = self.lock();
        Ok(state
            .samples
            .iter()
            .filter(|s| {
                state
                    .patients
                    .get(&s.patient_id)
                    .is_some_and(|p| p.owner_id == owner_id)
            })
            .copied()
            .collect())
    }

    async fn for_patient(
        &self,
        patient_id: PatientId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TemperatureSample>> {
        let mut samples: Vec<TemperatureSample> = self
            .lock()
            .samples
            .iter()
            .filter(|s| s.patient_id == patient_id && s.timestamp >= since)
            .copied()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }
}
