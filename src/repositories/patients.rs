use async_trait::async_trait;

use super::PatientStore;
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::lifecycle::{LifecycleError, Missing};
use crate::models::{NewPatient, Patient, PatientId};

pub struct PgPatientStore {
    pool: DbPool,
}

impl PgPatientStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientStore for PgPatientStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(
            r#"
            SELECT patient_id, owner_id, name, age, created_at
            FROM patients
            WHERE owner_id = $1
            ORDER BY patient_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(patients)
    }

    async fn get(&self, owner_id: &str, patient_id: PatientId) -> Result<Patient> {
        sqlx::query_as::<_, Patient>(
            r#"
            SELECT patient_id, owner_id, name, age, created_at
            FROM patients
            WHERE owner_id = $1 AND patient_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LifecycleError::NotFound(Missing::Patient(patient_id)).into())
    }

    async fn create(&self, owner_id: &str, patient: &NewPatient) -> Result<Patient> {
        let age = i32::try_from(patient.age)
            .map_err(|_| AppError::InvalidInput(format!("age {} is out of range", patient.age)))?;

        let created = sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (owner_id, name, age, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING patient_id, owner_id, name, age, created_at
            "#,
        )
        .bind(owner_id)
        .bind(&patient.name)
        .bind(age)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
