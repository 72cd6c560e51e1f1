use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::lifecycle::{Binding, LifecycleError, LifecycleManager, Missing, RegistryRequest};
use crate::models::{Device, MacAddress, PatientId};
use crate::repositories::{DeviceRegistry, PatientStore, RegistryScope};

/// Drives binding transitions against the registry.
///
/// Every transition loads a fresh ledger, plans, sends the plan to the
/// registry and only then commits it. The gate is held from the load until
/// the registry answers, so no two transitions interleave.
pub struct BindingService {
    patients: Arc<dyn PatientStore>,
    registry: Arc<dyn DeviceRegistry>,
    gate: Mutex<()>,
}

impl BindingService {
    pub fn new(patients: Arc<dyn PatientStore>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            patients,
            registry,
            gate: Mutex::new(()),
        }
    }

    pub async fn binding(&self, owner_id: &str, patient_id: PatientId) -> Result<Binding> {
        self.patients.get(owner_id, patient_id).await?;

        let ledger = self.ledger(RegistryScope::new().patient(patient_id)).await?;
        Self::projection(&ledger, patient_id)
    }

    pub async fn unassigned_devices(&self) -> Result<Vec<Device>> {
        self.registry.unassigned().await
    }

    pub async fn assign(
        &self,
        owner_id: &str,
        patient_id: PatientId,
        mac_address: &MacAddress,
    ) -> Result<Binding> {
        self.patients.get(owner_id, patient_id).await?;

        let _guard = self.gate.lock().await;
        let mut ledger = self
            .ledger(
                RegistryScope::new()
                    .patient(patient_id)
                    .device(mac_address.clone()),
            )
            .await?;

        let plan = match ledger.plan_assign(patient_id, mac_address) {
            Ok(plan) => plan,
            Err(e) => return Err(self.redact(owner_id, rejected("assign", e).into()).await),
        };
        self.send(owner_id, &mut ledger, &plan).await?;

        info!(patient_id = %patient_id, mac_address = %mac_address, "device assigned");
        Self::projection(&ledger, patient_id)
    }

    pub async fn set_interval(
        &self,
        owner_id: &str,
        mac_address: &MacAddress,
        seconds: u32,
    ) -> Result<Binding> {
        let _guard = self.gate.lock().await;
        let mut ledger = self
            .ledger(RegistryScope::new().device(mac_address.clone()))
            .await?;

        let plan = ledger
            .plan_set_interval(mac_address, seconds)
            .map_err(|e| rejected("set_interval", e))?;
        // a successful plan means the device is bound
        let patient_id = self.visible_owner(owner_id, &ledger, mac_address).await?;
        let patient_id = patient_id
            .ok_or_else(|| AppError::Internal("planned interval for unbound device".into()))?;
        self.send(owner_id, &mut ledger, &plan).await?;

        info!(
            patient_id = %patient_id,
            mac_address = %mac_address,
            sample_interval_seconds = seconds,
            "sample interval configured"
        );
        Self::projection(&ledger, patient_id)
    }

    /// Releases the device from its patient. Returns the patient it was bound
    /// to, or `None` when it was already free.
    pub async fn reset(
        &self,
        owner_id: &str,
        mac_address: &MacAddress,
    ) -> Result<Option<PatientId>> {
        let _guard = self.gate.lock().await;
        let mut ledger = self
            .ledger(RegistryScope::new().device(mac_address.clone()))
            .await?;

        let plan = ledger
            .plan_reset(mac_address)
            .map_err(|e| rejected("reset", e))?;
        let released = self.visible_owner(owner_id, &ledger, mac_address).await?;
        self.send(owner_id, &mut ledger, &plan).await?;

        match released {
            Some(patient_id) => {
                info!(patient_id = %patient_id, mac_address = %mac_address, "device released")
            }
            None => info!(mac_address = %mac_address, "device already unbound"),
        }
        Ok(released)
    }

    /// Removes the patient, releasing its device first. Returns the released
    /// device, if there was one.
    pub async fn delete_patient(
        &self,
        owner_id: &str,
        patient_id: PatientId,
    ) -> Result<Option<MacAddress>> {
        self.patients.get(owner_id, patient_id).await?;

        let _guard = self.gate.lock().await;
        let mut ledger = self.ledger(RegistryScope::new().patient(patient_id)).await?;

        let plan = ledger
            .plan_delete_patient(patient_id)
            .map_err(|e| rejected("delete_patient", e))?;
        self.send(owner_id, &mut ledger, &plan).await?;

        let released = plan.iter().find_map(|request| match request {
            RegistryRequest::Release { mac_address, .. } => Some(mac_address.clone()),
            _ => None,
        });
        info!(
            patient_id = %patient_id,
            released = ?released.as_ref().map(MacAddress::as_str),
            "patient deleted"
        );
        Ok(released)
    }

    async fn ledger(&self, scope: RegistryScope) -> Result<LifecycleManager> {
        let snapshot = self.registry.snapshot(&scope).await?;
        Ok(LifecycleManager::from_snapshot(snapshot))
    }

    async fn send(
        &self,
        owner_id: &str,
        ledger: &mut LifecycleManager,
        plan: &[RegistryRequest],
    ) -> Result<()> {
        if let Err(e) = self.registry.apply(plan).await {
            warn!(error = %e, "registry rejected transition");
            return Err(self.redact(owner_id, e).await);
        }
        ledger.commit(plan);
        Ok(())
    }

    /// Drops the holder from a conflict when that patient belongs to another
    /// account.
    async fn redact(&self, owner_id: &str, err: AppError) -> AppError {
        let (mac_address, holder) = match &err {
            AppError::Lifecycle(LifecycleError::Conflict {
                mac_address,
                patient_id: Some(holder),
            }) => (mac_address.clone(), *holder),
            _ => return err,
        };

        match self.patients.get(owner_id, holder).await {
            Ok(_) => err,
            Err(_) => LifecycleError::Conflict {
                mac_address,
                patient_id: None,
            }
            .into(),
        }
    }

    /// The patient the device is bound to, provided it belongs to `owner_id`.
    /// A device bound to another account's patient is reported as missing.
    async fn visible_owner(
        &self,
        owner_id: &str,
        ledger: &LifecycleManager,
        mac_address: &MacAddress,
    ) -> Result<Option<PatientId>> {
        let Some(patient_id) = ledger.bound_patient(mac_address)? else {
            return Ok(None);
        };

        match self.patients.get(owner_id, patient_id).await {
            Ok(_) => Ok(Some(patient_id)),
            Err(AppError::Lifecycle(LifecycleError::NotFound(_))) => {
                Err(LifecycleError::NotFound(Missing::Device(mac_address.clone())).into())
            }
            Err(e) => Err(e),
        }
    }

    fn projection(ledger: &LifecycleManager, patient_id: PatientId) -> Result<Binding> {
        ledger
            .binding(patient_id)
            .ok_or_else(|| LifecycleError::NotFound(Missing::Patient(patient_id)).into())
    }
}

fn rejected(operation: &'static str, err: LifecycleError) -> LifecycleError {
    warn!(operation, error = %err, "transition rejected");
    err
}
