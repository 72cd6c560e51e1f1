use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::SampleStore;
use crate::db::DbPool;
use crate::error::Result;
use crate::models::{PatientId, TemperatureSample};

pub struct PgSampleStore {
    pool: DbPool,
}

impl PgSampleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SampleStore for PgSampleStore {
    async fn for_owner(&self, owner_id: &str) -> Result<Vec<TemperatureSample>> {
        let samples = sqlx::query_as::<_, TemperatureSample>(
            r#"
            SELECT t.patient_id, t.recorded_at, t.temperature_c
            FROM temperatures t
            JOIN patients p ON p.patient_id = t.patient_id
            WHERE p.owner_id = $1
            ORDER BY t.recorded_at ASC, t.id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }

    async fn for_patient(
        &self,
        patient_id: PatientId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TemperatureSample>> {
        let samples = sqlx::query_as::<_, TemperatureSample>(
            r#"
            SELECT patient_id, recorded_at, temperature_c
            FROM temperatures
            WHERE patient_id = $1 AND recorded_at >= $2
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(patient_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }
}
