#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thermoband_api::api::AppState;
use thermoband_api::auth::Authenticator;
use thermoband_api::models::{MacAddress, NewPatient, PatientId, TemperatureSample};
use thermoband_api::repositories::{MemoryStore, PatientStore};

pub const OWNER: &str = "st-marys";
pub const OTHER_OWNER: &str = "general-hospital";

pub fn mac(raw: &str) -> MacAddress {
    MacAddress::parse(raw).unwrap()
}

pub struct Ward {
    pub store: MemoryStore,
    pub state: AppState,
}

/// In-memory ward with the given devices provisioned and proxy-header auth.
pub fn ward(devices: &[&str]) -> Ward {
    let store = MemoryStore::new();
    for device in devices {
        store.provision_device(mac(device));
    }

    let shared = Arc::new(store.clone());
    let state = AppState::new(
        shared.clone(),
        shared.clone(),
        shared,
        Authenticator::Proxy,
        NonZeroU32::new(6).unwrap(),
    );

    Ward { store, state }
}

pub async fn admit(store: &MemoryStore, owner: &str, name: &str) -> PatientId {
    store
        .create(owner, &NewPatient::parse(name, 60).unwrap())
        .await
        .unwrap()
        .patient_id
}

pub fn reading(
    patient_id: PatientId,
    timestamp: DateTime<Utc>,
    temperature_c: f64,
) -> TemperatureSample {
    TemperatureSample {
        patient_id,
        timestamp,
        temperature_c,
    }
}
