pub mod device;
pub mod patient;
pub mod temperature;

pub use device::{AssignDeviceRequest, BindingResponse, ResetResponse, SetIntervalRequest};
pub use patient::{
    CreatePatientRequest, DeletePatientResponse, OverviewQuery, PatientDetail, PatientResponse,
    PatientSummary,
};
pub use temperature::{HistoryQuery, HistoryResponse, ReadingResponse};
