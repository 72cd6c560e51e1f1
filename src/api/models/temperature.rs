use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

use crate::models::{PatientId, TemperatureSample};
use crate::services::{PatientHistory, PatientReading};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<NonZeroU32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub patient_id: PatientId,
    pub window_hours: NonZeroU32,
    pub samples: Vec<TemperatureSample>,
    pub latest: Option<TemperatureSample>,
}

impl From<PatientHistory> for HistoryResponse {
    fn from(history: PatientHistory) -> Self {
        Self {
            patient_id: history.patient_id,
            window_hours: history.window_hours,
            samples: history.samples,
            latest: history.latest,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
}

impl From<PatientReading> for ReadingResponse {
    fn from(reading: PatientReading) -> Self {
        Self {
            patient_id: reading.sample.patient_id,
            patient_name: reading.patient_name,
            timestamp: reading.sample.timestamp,
            temperature_c: reading.sample.temperature_c,
        }
    }
}
