pub mod binding;
pub mod dashboard;

pub use binding::BindingService;
pub use dashboard::{DashboardService, PatientHistory, PatientReading, PatientStatus};
