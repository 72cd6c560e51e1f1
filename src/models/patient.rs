use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;

use super::ValidationError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PatientId(pub i64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: PatientId,
    /// Subject of the hospital account that registered the patient.
    pub owner_id: String,
    pub name: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Patient {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let age: i32 = row.try_get("age")?;
        Ok(Self {
            patient_id: row.try_get("patient_id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            age: u32::try_from(age).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A validated registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
}

impl NewPatient {
    pub fn parse(name: &str, age: i64) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let age = u32::try_from(age).map_err(|_| ValidationError::InvalidAge(age))?;

        Ok(Self {
            name: name.to_string(),
            age,
        })
    }
}
