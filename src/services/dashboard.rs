use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::engine::{
    filter_by_range, latest_per_patient, latest_within_window, window_filter, TriageRange,
};
use crate::error::{AppError, Result};
use crate::models::{Patient, PatientId, TemperatureSample};
use crate::repositories::{PatientStore, SampleStore};

/// One roster row: a patient with its latest reading and the band it falls in.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientStatus {
    pub patient: Patient,
    pub latest: Option<TemperatureSample>,
    pub range: Option<TriageRange>,
}

/// Readings shown on the patient detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientHistory {
    pub patient_id: PatientId,
    pub window_hours: NonZeroU32,
    pub samples: Vec<TemperatureSample>,
    pub latest: Option<TemperatureSample>,
}

/// A reading on the account-wide chart, labelled with its patient.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientReading {
    pub patient_name: String,
    pub sample: TemperatureSample,
}

pub struct DashboardService {
    patients: Arc<dyn PatientStore>,
    samples: Arc<dyn SampleStore>,
    default_window_hours: NonZeroU32,
}

impl DashboardService {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        samples: Arc<dyn SampleStore>,
        default_window_hours: NonZeroU32,
    ) -> Self {
        Self {
            patients,
            samples,
            default_window_hours,
        }
    }

    /// The owner's roster filtered by triage range, using each patient's
    /// latest reading over the full history.
    pub async fn overview(&self, owner_id: &str, range: TriageRange) -> Result<Vec<PatientStatus>> {
        let (patients, samples) = tokio::try_join!(
            self.patients.list(owner_id),
            self.samples.for_owner(owner_id)
        )?;

        let latest = latest_per_patient(&samples);
        let visible = filter_by_range(&patients, &latest, range);
        debug!(
            roster = patients.len(),
            visible = visible.len(),
            range = ?range,
            "dashboard overview"
        );

        Ok(visible
            .into_iter()
            .map(|patient| {
                let latest = latest.get(&patient.patient_id).copied();
                PatientStatus {
                    range: latest.and_then(|s| TriageRange::classify(s.temperature_c)),
                    patient,
                    latest,
                }
            })
            .collect())
    }

    /// Latest reading per patient, ordered by patient.
    pub async fn latest(&self, owner_id: &str) -> Result<Vec<TemperatureSample>> {
        let samples = self.samples.for_owner(owner_id).await?;

        let mut latest: Vec<TemperatureSample> =
            latest_per_patient(&samples).into_values().collect();
        latest.sort_by_key(|s| s.patient_id);
        Ok(latest)
    }

    /// Readings recorded in the last `hours` (the configured lookback when
    /// `None`) before `now`.
    pub async fn history(
        &self,
        owner_id: &str,
        patient_id: PatientId,
        hours: Option<NonZeroU32>,
        now: DateTime<Utc>,
    ) -> Result<PatientHistory> {
        self.patients.get(owner_id, patient_id).await?;

        let (window_hours, window_seconds) = self.window(hours)?;
        let since = now - Duration::seconds(i64::from(window_seconds.get()));
        let fetched = self.samples.for_patient(patient_id, since).await?;

        Ok(PatientHistory {
            patient_id,
            window_hours,
            samples: window_filter(&fetched, now, window_seconds),
            latest: latest_within_window(&fetched, now, window_seconds).remove(&patient_id),
        })
    }

    /// Every reading of the owner's roster recorded in the last `hours`,
    /// oldest first.
    pub async fn readings(
        &self,
        owner_id: &str,
        hours: Option<NonZeroU32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PatientReading>> {
        let (_, window_seconds) = self.window(hours)?;
        let (patients, samples) = tokio::try_join!(
            self.patients.list(owner_id),
            self.samples.for_owner(owner_id)
        )?;

        let names: HashMap<PatientId, &str> = patients
            .iter()
            .map(|p| (p.patient_id, p.name.as_str()))
            .collect();

        let readings: Vec<PatientReading> = window_filter(&samples, now, window_seconds)
            .into_iter()
            .filter_map(|sample| {
                names.get(&sample.patient_id).map(|name| PatientReading {
                    patient_name: name.to_string(),
                    sample,
                })
            })
            .collect();
        debug!(fetched = samples.len(), shown = readings.len(), "roster readings");

        Ok(readings)
    }

    fn window(&self, hours: Option<NonZeroU32>) -> Result<(NonZeroU32, NonZeroU32)> {
        let window_hours = hours.unwrap_or(self.default_window_hours);
        let window_seconds = window_hours
            .get()
            .checked_mul(3600)
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("window of {window_hours} hours is too long"))
            })?;
        Ok((window_hours, window_seconds))
    }
}
