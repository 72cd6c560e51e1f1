//! Pure computations over already-fetched sample sets. Nothing in here
//! touches I/O or suspends.

pub mod aggregation;
pub mod triage;

pub use aggregation::{latest_per_patient, latest_within_window, window_filter, LatestSnapshot};
pub use triage::{filter_by_range, TemperatureBand, TriageRange};
