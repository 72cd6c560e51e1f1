mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{admit, mac, ward, OTHER_OWNER, OWNER};
use pretty_assertions::assert_eq;
use thermoband_api::error::{AppError, Result};
use thermoband_api::lifecycle::{
    LifecycleError, LifecycleManager, Missing, RegistryRequest, RegistrySnapshot,
};
use thermoband_api::models::{Device, SampleInterval};
use thermoband_api::repositories::{DeviceRegistry, MemoryStore, RegistryScope};
use thermoband_api::services::BindingService;
use tokio::sync::Barrier;
use tokio_test::{assert_err, assert_ok};

const DEVICE: &str = "AA:00:00:00:00:01";
const SPARE: &str = "AA:00:00:00:00:02";

#[tokio::test]
async fn test_bind_configure_reset_cycle() {
    let ward = ward(&[DEVICE, SPARE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let binding = &ward.state.binding;

    let bound = binding.assign(OWNER, patient, &mac(DEVICE)).await.unwrap();
    assert_eq!(bound.mac_address, Some(mac(DEVICE)));
    assert_eq!(bound.sample_interval_seconds, None);
    assert_eq!(bound.state().label(), "BOUND_NO_INTERVAL");

    let configured = binding.set_interval(OWNER, &mac(DEVICE), 900).await.unwrap();
    assert_eq!(
        configured.sample_interval_seconds,
        Some(SampleInterval::FifteenMinutes)
    );

    let released = binding.reset(OWNER, &mac(DEVICE)).await.unwrap();
    assert_eq!(released, Some(patient));

    let after = binding.binding(OWNER, patient).await.unwrap();
    assert_eq!(after.state().label(), "UNBOUND");
    assert_eq!(after.sample_interval_seconds, None);
    assert_eq!(
        binding.unassigned_devices().await.unwrap(),
        vec![Device::unbound(mac(DEVICE)), Device::unbound(mac(SPARE))]
    );
}

#[tokio::test]
async fn test_reset_unbound_device_is_noop() {
    let ward = ward(&[DEVICE]);

    let released = ward.state.binding.reset(OTHER_OWNER, &mac(DEVICE)).await.unwrap();

    assert_eq!(released, None);
    assert_eq!(ward.store.device(&mac(DEVICE)), Some(Device::unbound(mac(DEVICE))));
}

#[tokio::test]
async fn test_second_patient_cannot_take_bound_device() {
    let ward = ward(&[DEVICE]);
    let first = admit(&ward.store, OWNER, "Grace").await;
    let second = admit(&ward.store, OWNER, "Alan").await;
    let binding = &ward.state.binding;
    binding.assign(OWNER, first, &mac(DEVICE)).await.unwrap();

    let err = binding.assign(OWNER, second, &mac(DEVICE)).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Lifecycle(LifecycleError::Conflict { patient_id, .. })
            if patient_id == Some(first)
    ));
    assert_eq!(
        binding.binding(OWNER, first).await.unwrap().mac_address,
        Some(mac(DEVICE))
    );
    assert_eq!(binding.binding(OWNER, second).await.unwrap().mac_address, None);
}

#[tokio::test]
async fn test_invalid_interval_keeps_configuration() {
    let ward = ward(&[DEVICE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let binding = &ward.state.binding;
    binding.assign(OWNER, patient, &mac(DEVICE)).await.unwrap();
    binding.set_interval(OWNER, &mac(DEVICE), 3600).await.unwrap();

    let err = binding.set_interval(OWNER, &mac(DEVICE), 123).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Lifecycle(LifecycleError::InvalidInterval(_))
    ));
    assert_eq!(
        binding.binding(OWNER, patient).await.unwrap().sample_interval_seconds,
        Some(SampleInterval::OneHour)
    );
}

#[tokio::test]
async fn test_set_interval_on_free_device_not_bound() {
    let ward = ward(&[DEVICE]);

    let err = ward
        .state
        .binding
        .set_interval(OWNER, &mac(DEVICE), 300)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Lifecycle(LifecycleError::NotBound { .. })
    ));
}

#[tokio::test]
async fn test_delete_patient_returns_device_to_pool() {
    let ward = ward(&[DEVICE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let binding = &ward.state.binding;
    binding.assign(OWNER, patient, &mac(DEVICE)).await.unwrap();
    binding.set_interval(OWNER, &mac(DEVICE), 1800).await.unwrap();

    let released = binding.delete_patient(OWNER, patient).await.unwrap();

    assert_eq!(released, Some(mac(DEVICE)));
    assert_eq!(
        binding.unassigned_devices().await.unwrap(),
        vec![Device::unbound(mac(DEVICE))]
    );
    assert!(matches!(
        binding.binding(OWNER, patient).await,
        Err(AppError::Lifecycle(LifecycleError::NotFound(Missing::Patient(_))))
    ));

    // the released device can be bound again
    let next = admit(&ward.store, OWNER, "Alan").await;
    assert_ok!(binding.assign(OWNER, next, &mac(DEVICE)).await);
}

#[tokio::test]
async fn test_other_accounts_cannot_touch_binding() {
    let ward = ward(&[DEVICE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let binding = &ward.state.binding;
    binding.assign(OWNER, patient, &mac(DEVICE)).await.unwrap();

    assert!(matches!(
        binding.reset(OTHER_OWNER, &mac(DEVICE)).await,
        Err(AppError::Lifecycle(LifecycleError::NotFound(Missing::Device(_))))
    ));
    assert!(matches!(
        binding.set_interval(OTHER_OWNER, &mac(DEVICE), 300).await,
        Err(AppError::Lifecycle(LifecycleError::NotFound(Missing::Device(_))))
    ));
    assert!(matches!(
        binding.delete_patient(OTHER_OWNER, patient).await,
        Err(AppError::Lifecycle(LifecycleError::NotFound(Missing::Patient(_))))
    ));
    assert_eq!(
        ward.store.device(&mac(DEVICE)).and_then(|d| d.patient_id),
        Some(patient)
    );
}

#[tokio::test]
async fn test_conflict_hides_other_accounts_patient() {
    let ward = ward(&[DEVICE]);
    let theirs = admit(&ward.store, OTHER_OWNER, "Edsger").await;
    let ours = admit(&ward.store, OWNER, "Grace").await;
    let binding = &ward.state.binding;
    binding.assign(OTHER_OWNER, theirs, &mac(DEVICE)).await.unwrap();

    let err = binding.assign(OWNER, ours, &mac(DEVICE)).await.unwrap_err();

    assert!(matches!(
        &err,
        AppError::Lifecycle(LifecycleError::Conflict { patient_id: None, .. })
    ));
    assert!(!err.to_string().contains(&format!("patient {theirs}")));

    // the holder's own account still sees who holds the device
    let other = admit(&ward.store, OTHER_OWNER, "Barbara").await;
    assert!(matches!(
        binding.assign(OTHER_OWNER, other, &mac(DEVICE)).await,
        Err(AppError::Lifecycle(LifecycleError::Conflict { patient_id, .. }))
            if patient_id == Some(theirs)
    ));
}

#[tokio::test]
async fn test_stale_reset_from_another_instance_is_refused() {
    let ward = ward(&[DEVICE]);
    let first = admit(&ward.store, OWNER, "Grace").await;
    let second = admit(&ward.store, OWNER, "Alan").await;
    let binding = &ward.state.binding;
    binding.assign(OWNER, first, &mac(DEVICE)).await.unwrap();

    // another instance plans a reset while the device is still with `first`
    let scope = RegistryScope::new().device(mac(DEVICE));
    let stale = LifecycleManager::from_snapshot(ward.store.snapshot(&scope).await.unwrap());
    let plan = stale.plan_reset(&mac(DEVICE)).unwrap();

    binding.reset(OWNER, &mac(DEVICE)).await.unwrap();
    binding.assign(OWNER, second, &mac(DEVICE)).await.unwrap();

    assert!(matches!(
        ward.store.apply(&plan).await,
        Err(AppError::Lifecycle(LifecycleError::Conflict { patient_id, .. }))
            if patient_id == Some(second)
    ));
    assert_eq!(
        ward.store.device(&mac(DEVICE)).and_then(|d| d.patient_id),
        Some(second)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_assigns_on_one_device_exactly_one_wins() {
    let ward = ward(&[DEVICE]);
    let first = admit(&ward.store, OWNER, "Grace").await;
    let second = admit(&ward.store, OWNER, "Alan").await;
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|patient| {
            let binding = Arc::clone(&ward.state.binding);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                binding.assign(OWNER, patient, &mac(DEVICE)).await
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(AppError::Lifecycle(LifecycleError::Conflict { .. })) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((wins, conflicts), (1, 1));
    assert!(ward.state.binding.unassigned_devices().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_assigns_on_one_patient_exactly_one_wins() {
    let ward = ward(&[DEVICE, SPARE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [DEVICE, SPARE]
        .into_iter()
        .map(|device| {
            let binding = Arc::clone(&ward.state.binding);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                binding.assign(OWNER, patient, &mac(device)).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(ward.state.binding.unassigned_devices().await.unwrap().len(), 1);
}

/// Registry that accepts reads but refuses every write.
struct ReadOnlyRegistry(MemoryStore);

#[async_trait]
impl DeviceRegistry for ReadOnlyRegistry {
    async fn snapshot(&self, scope: &RegistryScope) -> Result<RegistrySnapshot> {
        self.0.snapshot(scope).await
    }

    async fn unassigned(&self) -> Result<Vec<Device>> {
        self.0.unassigned().await
    }

    async fn apply(&self, _requests: &[RegistryRequest]) -> Result<()> {
        Err(AppError::Internal("registry unavailable".into()))
    }
}

#[tokio::test]
async fn test_registry_failure_leaves_binding_untouched() {
    let ward = ward(&[DEVICE]);
    let patient = admit(&ward.store, OWNER, "Grace").await;
    let service = BindingService::new(
        Arc::new(ward.store.clone()),
        Arc::new(ReadOnlyRegistry(ward.store.clone())),
    );

    assert_err!(service.assign(OWNER, patient, &mac(DEVICE)).await);

    assert_eq!(service.binding(OWNER, patient).await.unwrap().mac_address, None);
    assert_eq!(ward.store.device(&mac(DEVICE)), Some(Device::unbound(mac(DEVICE))));
}
