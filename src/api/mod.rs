pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use routes::create_router;

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::repositories::{DeviceRegistry, PatientStore, SampleStore};
use crate::services::{BindingService, DashboardService};

#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<dyn PatientStore>,
    pub binding: Arc<BindingService>,
    pub dashboard: Arc<DashboardService>,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        registry: Arc<dyn DeviceRegistry>,
        samples: Arc<dyn SampleStore>,
        authenticator: Authenticator,
        history_window_hours: NonZeroU32,
    ) -> Self {
        Self {
            binding: Arc::new(BindingService::new(patients.clone(), registry)),
            dashboard: Arc::new(DashboardService::new(
                patients.clone(),
                samples,
                history_window_hours,
            )),
            patients,
            authenticator: Arc::new(authenticator),
        }
    }
}
