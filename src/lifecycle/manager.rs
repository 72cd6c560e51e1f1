use std::collections::HashMap;

use super::{Binding, BindingState, LifecycleError, Missing, RegistryRequest};
use crate::models::{Device, MacAddress, PatientId, SampleInterval};

/// Registry rows a transition is validated against. May cover only the
/// patients and devices the transition touches.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub patients: Vec<PatientId>,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleManager {
    patients: HashMap<PatientId, BindingState>,
    /// Every known device and the patient it is bound to, if any.
    devices: HashMap<MacAddress, Option<PatientId>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let mut manager = Self {
            patients: snapshot
                .patients
                .into_iter()
                .map(|id| (id, BindingState::Unbound))
                .collect(),
            devices: HashMap::with_capacity(snapshot.devices.len()),
        };

        for device in snapshot.devices {
            if let Some(state) = device
                .patient_id
                .and_then(|id| manager.patients.get_mut(&id))
            {
                *state = BindingState::from_parts(
                    Some(device.mac_address.clone()),
                    device.sample_interval_seconds,
                );
            }
            manager.devices.insert(device.mac_address, device.patient_id);
        }

        manager
    }

    pub fn add_patient(&mut self, patient_id: PatientId) {
        self.patients.entry(patient_id).or_default();
    }

    pub fn add_device(&mut self, mac_address: MacAddress) {
        self.devices.entry(mac_address).or_insert(None);
    }

    pub fn state(&self, patient_id: PatientId) -> Option<&BindingState> {
        self.patients.get(&patient_id)
    }

    pub fn binding(&self, patient_id: PatientId) -> Option<Binding> {
        self.state(patient_id)
            .map(|state| Binding::project(patient_id, state))
    }

    /// The patient a device is bound to. Unknown devices are an error.
    pub fn bound_patient(
        &self,
        mac_address: &MacAddress,
    ) -> Result<Option<PatientId>, LifecycleError> {
        self.devices
            .get(mac_address)
            .copied()
            .ok_or_else(|| LifecycleError::NotFound(Missing::Device(mac_address.clone())))
    }

    /// Devices free for assignment, sorted by address.
    pub fn unassigned_devices(&self) -> Vec<MacAddress> {
        let mut free: Vec<MacAddress> = self
            .devices
            .iter()
            .filter(|(_, owner)| owner.is_none())
            .map(|(mac, _)| mac.clone())
            .collect();
        free.sort();
        free
    }

    pub fn plan_assign(
        &self,
        patient_id: PatientId,
        mac_address: &MacAddress,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let state = self.patient_state(patient_id)?;

        if let Some(owner) = self.bound_patient(mac_address)? {
            return Err(LifecycleError::Conflict {
                mac_address: mac_address.clone(),
                patient_id: Some(owner),
            });
        }
        if let Some(current) = state.mac_address() {
            return Err(LifecycleError::Conflict {
                mac_address: current.clone(),
                patient_id: Some(patient_id),
            });
        }

        Ok(vec![RegistryRequest::Bind {
            patient_id,
            mac_address: mac_address.clone(),
        }])
    }

    pub fn plan_set_interval(
        &self,
        mac_address: &MacAddress,
        seconds: u32,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let owner = self.bound_patient(mac_address)?;
        let interval = SampleInterval::try_from(seconds)?;
        let Some(patient_id) = owner else {
            return Err(LifecycleError::NotBound {
                mac_address: mac_address.clone(),
            });
        };

        Ok(vec![RegistryRequest::ConfigureInterval {
            mac_address: mac_address.clone(),
            patient_id,
            interval,
        }])
    }

    /// Empty plan when the device is already unbound.
    pub fn plan_reset(
        &self,
        mac_address: &MacAddress,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        match self.bound_patient(mac_address)? {
            Some(patient_id) => Ok(vec![RegistryRequest::Release {
                mac_address: mac_address.clone(),
                patient_id,
            }]),
            None => Ok(Vec::new()),
        }
    }

    /// Releases the patient's device, if any, before removing the patient.
    pub fn plan_delete_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let state = self.patient_state(patient_id)?;

        let mut plan = Vec::with_capacity(2);
        if let Some(mac_address) = state.mac_address() {
            plan.push(RegistryRequest::Release {
                mac_address: mac_address.clone(),
                patient_id,
            });
        }
        plan.push(RegistryRequest::RemovePatient { patient_id });

        Ok(plan)
    }

    /// Applies an accepted plan to the ledger.
    pub fn commit(&mut self, requests: &[RegistryRequest]) {
        for request in requests {
            self.apply(request);
        }
    }

    pub fn assign(
        &mut self,
        patient_id: PatientId,
        mac_address: &MacAddress,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let plan = self.plan_assign(patient_id, mac_address)?;
        self.commit(&plan);
        Ok(plan)
    }

    pub fn set_interval(
        &mut self,
        mac_address: &MacAddress,
        seconds: u32,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let plan = self.plan_set_interval(mac_address, seconds)?;
        self.commit(&plan);
        Ok(plan)
    }

    pub fn reset(
        &mut self,
        mac_address: &MacAddress,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let plan = self.plan_reset(mac_address)?;
        self.commit(&plan);
        Ok(plan)
    }

    pub fn delete_patient(
        &mut self,
        patient_id: PatientId,
    ) -> Result<Vec<RegistryRequest>, LifecycleError> {
        let plan = self.plan_delete_patient(patient_id)?;
        self.commit(&plan);
        Ok(plan)
    }

    fn patient_state(&self, patient_id: PatientId) -> Result<&BindingState, LifecycleError> {
        self.patients
            .get(&patient_id)
            .ok_or(LifecycleError::NotFound(Missing::Patient(patient_id)))
    }

    fn apply(&mut self, request: &RegistryRequest) {
        match request {
            RegistryRequest::Bind {
                patient_id,
                mac_address,
            } => {
                self.devices.insert(mac_address.clone(), Some(*patient_id));
                self.patients.insert(
                    *patient_id,
                    BindingState::BoundNoInterval {
                        mac_address: mac_address.clone(),
                    },
                );
            }
            RegistryRequest::ConfigureInterval {
                mac_address,
                patient_id,
                interval,
            } => {
                if let Some(state) = self.patients.get_mut(patient_id) {
                    *state = BindingState::BoundConfigured {
                        mac_address: mac_address.clone(),
                        interval: *interval,
                    };
                }
            }
            RegistryRequest::Release {
                mac_address,
                patient_id,
            } => {
                if let Some(owner) = self.devices.get_mut(mac_address) {
                    *owner = None;
                }
                if let Some(state) = self.patients.get_mut(patient_id) {
                    *state = BindingState::Unbound;
                }
            }
            RegistryRequest::RemovePatient { patient_id } => {
                self.patients.remove(patient_id);
                for owner in self.devices.values_mut() {
                    if *owner == Some(*patient_id) {
                        *owner = None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    fn mac(s: &str) -> MacAddress {
        MacAddress::parse(s).unwrap()
    }

    fn ward() -> LifecycleManager {
        let mut manager = LifecycleManager::new();
        manager.add_patient(PatientId(1));
        manager.add_patient(PatientId(2));
        manager.add_device(mac("AA:00:00:00:00:01"));
        manager.add_device(mac("AA:00:00:00:00:02"));
        manager
    }

    #[test]
    fn test_assign_moves_to_bound_no_interval() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");

        let plan = manager.assign(PatientId(1), &device).unwrap();

        assert_eq!(
            plan,
            vec![RegistryRequest::Bind {
                patient_id: PatientId(1),
                mac_address: device.clone(),
            }]
        );
        assert_eq!(
            manager.state(PatientId(1)),
            Some(&BindingState::BoundNoInterval {
                mac_address: device.clone()
            })
        );
        assert_eq!(manager.unassigned_devices(), vec![mac("AA:00:00:00:00:02")]);
    }

    #[test]
    fn test_assign_same_device_to_second_patient_conflicts() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();
        let before = manager.binding(PatientId(1));

        let err = manager.assign(PatientId(2), &device).unwrap_err();

        assert_eq!(
            err,
            LifecycleError::Conflict {
                mac_address: device,
                patient_id: Some(PatientId(1))
            }
        );
        assert_eq!(manager.binding(PatientId(1)), before);
        assert_eq!(manager.state(PatientId(2)), Some(&BindingState::Unbound));
    }

    #[test]
    fn test_assign_requires_unbound_patient() {
        let mut manager = ward();
        let first = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &first).unwrap();

        let err = manager
            .assign(PatientId(1), &mac("AA:00:00:00:00:02"))
            .unwrap_err();

        assert_eq!(
            err,
            LifecycleError::Conflict {
                mac_address: first,
                patient_id: Some(PatientId(1))
            }
        );
        assert_eq!(manager.unassigned_devices().len(), 1);
    }

    #[test]
    fn test_assign_unknown_patient_or_device_not_found() {
        let mut manager = ward();
        assert_eq!(
            manager.assign(PatientId(9), &mac("AA:00:00:00:00:01")),
            Err(LifecycleError::NotFound(Missing::Patient(PatientId(9))))
        );
        assert_eq!(
            manager.assign(PatientId(1), &mac("FF:FF")),
            Err(LifecycleError::NotFound(Missing::Device(mac("FF:FF"))))
        );
    }

    #[test]
    fn test_set_interval_configures_and_reconfigures() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();

        manager.set_interval(&device, 900).unwrap();
        assert_eq!(
            manager.state(PatientId(1)).and_then(BindingState::interval),
            Some(SampleInterval::FifteenMinutes)
        );

        manager.set_interval(&device, 21600).unwrap();
        assert_eq!(
            manager.state(PatientId(1)).unwrap(),
            &BindingState::BoundConfigured {
                mac_address: device,
                interval: SampleInterval::SixHours
            }
        );
    }

    #[test]
    fn test_set_interval_invalid_keeps_existing_interval() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();
        manager.set_interval(&device, 3600).unwrap();

        let err = manager.set_interval(&device, 123).unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidInterval(_)));
        assert_eq!(
            manager.state(PatientId(1)).and_then(BindingState::interval),
            Some(SampleInterval::OneHour)
        );
    }

    #[test]
    fn test_set_interval_on_unbound_device_not_bound() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:02");
        assert_eq!(
            manager.set_interval(&device, 300),
            Err(LifecycleError::NotBound {
                mac_address: device
            })
        );
    }

    #[test]
    fn test_reset_releases_device_and_is_idempotent() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();
        manager.set_interval(&device, 300).unwrap();

        let plan = manager.reset(&device).unwrap();
        assert_eq!(
            plan,
            vec![RegistryRequest::Release {
                mac_address: device.clone(),
                patient_id: PatientId(1),
            }]
        );
        assert_eq!(manager.state(PatientId(1)), Some(&BindingState::Unbound));
        assert!(manager.unassigned_devices().contains(&device));

        let again = manager.reset(&device).unwrap();
        assert!(again.is_empty());
        assert_eq!(manager.state(PatientId(1)), Some(&BindingState::Unbound));
    }

    #[test]
    fn test_interval_plan_names_bound_patient() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(2), &device).unwrap();

        assert_eq!(
            manager.plan_set_interval(&device, 300),
            Ok(vec![RegistryRequest::ConfigureInterval {
                mac_address: device,
                patient_id: PatientId(2),
                interval: SampleInterval::FiveMinutes,
            }])
        );
    }

    #[test]
    fn test_reset_then_reassign_to_other_patient() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();
        manager.reset(&device).unwrap();

        manager.assign(PatientId(2), &device).unwrap();
        assert_eq!(manager.bound_patient(&device), Ok(Some(PatientId(2))));
    }

    #[test]
    fn test_delete_patient_releases_before_removing() {
        let mut manager = ward();
        let device = mac("AA:00:00:00:00:01");
        manager.assign(PatientId(1), &device).unwrap();

        let plan = manager.delete_patient(PatientId(1)).unwrap();

        assert_eq!(
            plan,
            vec![
                RegistryRequest::Release {
                    mac_address: device.clone(),
                    patient_id: PatientId(1),
                },
                RegistryRequest::RemovePatient { patient_id: PatientId(1) },
            ]
        );
        assert_eq!(manager.state(PatientId(1)), None);
        assert!(manager.unassigned_devices().contains(&device));
    }

    #[test]
    fn test_delete_unbound_patient_only_removes() {
        let mut manager = ward();
        let plan = manager.delete_patient(PatientId(2)).unwrap();
        assert_eq!(plan, vec![RegistryRequest::RemovePatient { patient_id: PatientId(2) }]);
        assert_eq!(
            manager.delete_patient(PatientId(2)),
            Err(LifecycleError::NotFound(Missing::Patient(PatientId(2))))
        );
    }

    #[test]
    fn test_from_snapshot_restores_states() {
        let manager = LifecycleManager::from_snapshot(RegistrySnapshot {
            patients: vec![PatientId(1), PatientId(2)],
            devices: vec![
                Device {
                    mac_address: mac("AA:00:00:00:00:01"),
                    patient_id: Some(PatientId(1)),
                    sample_interval_seconds: Some(SampleInterval::ThirtyMinutes),
                },
                Device {
                    mac_address: mac("AA:00:00:00:00:03"),
                    patient_id: Some(PatientId(7)),
                    sample_interval_seconds: None,
                },
                Device::unbound(mac("AA:00:00:00:00:02")),
            ],
        });

        assert_eq!(
            manager.state(PatientId(1)).map(BindingState::label),
            Some("BOUND_CONFIGURED")
        );
        assert_eq!(manager.state(PatientId(2)), Some(&BindingState::Unbound));
        // bound to a patient outside the snapshot, still not free
        assert_eq!(
            manager.bound_patient(&mac("AA:00:00:00:00:03")),
            Ok(Some(PatientId(7)))
        );
        assert_eq!(manager.unassigned_devices(), vec![mac("AA:00:00:00:00:02")]);
    }

    #[test]
    fn test_racing_assigns_exactly_one_wins() {
        let manager = Arc::new(Mutex::new(ward()));
        let barrier = Arc::new(Barrier::new(2));
        let device = mac("AA:00:00:00:00:01");

        let handles: Vec<_> = [PatientId(1), PatientId(2)]
            .into_iter()
            .map(|patient| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                let device = device.clone();
                thread::spawn(move || {
                    barrier.wait();
                    manager.lock().unwrap().assign(patient, &device)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::Conflict { .. })))
            .count();

        assert_eq!((wins, conflicts), (1, 1));
    }
}
