use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{DeviceRegistry, RegistryScope};
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::lifecycle::{LifecycleError, Missing, RegistryRequest, RegistrySnapshot};
use crate::models::{Device, MacAddress, PatientId, SampleInterval};

pub struct PgDeviceRegistry {
    pool: DbPool,
}

impl PgDeviceRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn bind_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        patient_id: PatientId,
        mac_address: &MacAddress,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET patient_id = $1, sample_interval_seconds = NULL
            WHERE mac_address = $2 AND patient_id IS NULL
            "#,
        )
        .bind(patient_id)
        .bind(mac_address)
        .execute(&mut **tx)
        .await
        .map_err(|e| match e {
            // devices.patient_id is unique, so the patient already wears another device
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::from(LifecycleError::Conflict {
                    mac_address: mac_address.clone(),
                    patient_id: Some(patient_id),
                })
            }
            other => AppError::from(other),
        })?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        Err(match Self::current_owner(tx, mac_address).await? {
            None => LifecycleError::NotFound(Missing::Device(mac_address.clone())).into(),
            Some(Some(owner)) => LifecycleError::Conflict {
                mac_address: mac_address.clone(),
                patient_id: Some(owner),
            }
            .into(),
            Some(None) => AppError::Internal(format!("device {} changed during bind", mac_address)),
        })
    }

    /// `None` for an unknown device, otherwise the patient it is bound to.
    async fn current_owner(
        tx: &mut Transaction<'_, Postgres>,
        mac_address: &MacAddress,
    ) -> Result<Option<Option<PatientId>>> {
        let owner: Option<Option<PatientId>> =
            sqlx::query_scalar("SELECT patient_id FROM devices WHERE mac_address = $1")
                .bind(mac_address)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(owner)
    }

    /// Explains why an update guarded on `patient_id` touched no row.
    async fn binding_moved(
        tx: &mut Transaction<'_, Postgres>,
        mac_address: &MacAddress,
        patient_id: PatientId,
    ) -> AppError {
        match Self::current_owner(tx, mac_address).await {
            Ok(None) => LifecycleError::NotFound(Missing::Device(mac_address.clone())).into(),
            Ok(Some(None)) => LifecycleError::NotBound {
                mac_address: mac_address.clone(),
            }
            .into(),
            Ok(Some(Some(owner))) if owner != patient_id => LifecycleError::Conflict {
                mac_address: mac_address.clone(),
                patient_id: Some(owner),
            }
            .into(),
            Ok(Some(Some(_))) => {
                AppError::Internal(format!("device {} update matched no row", mac_address))
            }
            Err(e) => e,
        }
    }

    async fn configure_interval_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        mac_address: &MacAddress,
        patient_id: PatientId,
        interval: SampleInterval,
    ) -> Result<()> {
        let seconds = i32::try_from(interval.seconds())
            .map_err(|_| AppError::Internal(format!("interval {} overflows", interval.seconds())))?;

        let result = sqlx::query(
            r#"
            UPDATE devices
            SET sample_interval_seconds = $3
            WHERE mac_address = $1 AND patient_id = $2
            "#,
        )
        .bind(mac_address)
        .bind(patient_id)
        .bind(seconds)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::binding_moved(tx, mac_address, patient_id).await);
        }
        Ok(())
    }

    async fn release_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        mac_address: &MacAddress,
        patient_id: PatientId,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET patient_id = NULL, sample_interval_seconds = NULL
            WHERE mac_address = $1 AND patient_id = $2
            "#,
        )
        .bind(mac_address)
        .bind(patient_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::binding_moved(tx, mac_address, patient_id).await);
        }
        Ok(())
    }

    async fn remove_patient_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        patient_id: PatientId,
    ) -> Result<()> {
        let result = sqlx::query("DELETE FROM patients WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LifecycleError::NotFound(Missing::Patient(patient_id)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceRegistry for PgDeviceRegistry {
    async fn snapshot(&self, scope: &RegistryScope) -> Result<RegistrySnapshot> {
        let patient_ids: Vec<i64> = scope.patients.iter().map(|id| id.0).collect();
        let macs: Vec<String> = scope
            .devices
            .iter()
            .map(|mac| mac.as_str().to_string())
            .collect();

        let patients: Vec<PatientId> = sqlx::query_scalar(
            r#"
            SELECT patient_id FROM patients WHERE patient_id = ANY($1)
            UNION
            SELECT patient_id FROM devices
            WHERE mac_address = ANY($2) AND patient_id IS NOT NULL
            "#,
        )
        .bind(&patient_ids)
        .bind(&macs)
        .fetch_all(&self.pool)
        .await?;

        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT mac_address, patient_id, sample_interval_seconds
            FROM devices
            WHERE mac_address = ANY($1) OR patient_id = ANY($2)
            "#,
        )
        .bind(&macs)
        .bind(&patient_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(RegistrySnapshot { patients, devices })
    }

    async fn unassigned(&self) -> Result<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT mac_address, patient_id, sample_interval_seconds
            FROM devices
            WHERE patient_id IS NULL
            ORDER BY mac_address
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    async fn apply(&self, requests: &[RegistryRequest]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for request in requests {
            match request {
                RegistryRequest::Bind {
                    patient_id,
                    mac_address,
                } => Self::bind_in_tx(&mut tx, *patient_id, mac_address).await?,
                RegistryRequest::ConfigureInterval {
                    mac_address,
                    patient_id,
                    interval,
                } => {
                    Self::configure_interval_in_tx(&mut tx, mac_address, *patient_id, *interval)
                        .await?
                }
                RegistryRequest::Release {
                    mac_address,
                    patient_id,
                } => Self::release_in_tx(&mut tx, mac_address, *patient_id).await?,
                RegistryRequest::RemovePatient { patient_id } => {
                    Self::remove_patient_in_tx(&mut tx, *patient_id).await?
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
