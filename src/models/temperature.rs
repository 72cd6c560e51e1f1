use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

use super::PatientId;

/// One reading from a wearable sensor. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSample {
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
}

impl<'r> FromRow<'r, PgRow> for TemperatureSample {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            patient_id: row.try_get("patient_id")?,
            timestamp: row.try_get("recorded_at")?,
            temperature_c: row.try_get("temperature_c")?,
        })
    }
}
