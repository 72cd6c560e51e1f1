use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use thiserror::Error;

use super::{PatientId, ValidationError};

/// Sensor identifier, normalised to upper-case hex pairs joined by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidMacAddress(raw.to_string());
        let trimmed = raw.trim();

        let groups: Vec<&str> = trimmed.split([':', '-']).collect();
        if !(2..=8).contains(&groups.len()) {
            return Err(invalid());
        }
        if groups
            .iter()
            .any(|g| g.len() != 2 || !g.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(invalid());
        }

        Ok(Self(groups.join(":").to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sample interval {0}s is not one of 300, 900, 1800, 3600, 21600")]
pub struct InvalidInterval(pub u32);

/// The fixed set of periods a sensor can be configured to report at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleInterval {
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    SixHours,
}

impl SampleInterval {
    pub const ALL: [SampleInterval; 5] = [
        SampleInterval::FiveMinutes,
        SampleInterval::FifteenMinutes,
        SampleInterval::ThirtyMinutes,
        SampleInterval::OneHour,
        SampleInterval::SixHours,
    ];

    pub fn seconds(self) -> u32 {
        match self {
            SampleInterval::FiveMinutes => 300,
            SampleInterval::FifteenMinutes => 900,
            SampleInterval::ThirtyMinutes => 1800,
            SampleInterval::OneHour => 3600,
            SampleInterval::SixHours => 21600,
        }
    }
}

impl TryFrom<u32> for SampleInterval {
    type Error = InvalidInterval;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.seconds() == seconds)
            .ok_or(InvalidInterval(seconds))
    }
}

impl From<SampleInterval> for u32 {
    fn from(interval: SampleInterval) -> Self {
        interval.seconds()
    }
}

/// Registry row for a physical sensor and whatever it is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub mac_address: MacAddress,
    pub patient_id: Option<PatientId>,
    pub sample_interval_seconds: Option<SampleInterval>,
}

impl Device {
    pub fn unbound(mac_address: MacAddress) -> Self {
        Self {
            mac_address,
            patient_id: None,
            sample_interval_seconds: None,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Device {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let interval: Option<i32> = row.try_get("sample_interval_seconds")?;
        let sample_interval_seconds = interval
            .map(|s| {
                u32::try_from(s)
                    .map_err(|_| InvalidInterval(0))
                    .and_then(SampleInterval::try_from)
            })
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            mac_address: row.try_get("mac_address")?,
            patient_id: row.try_get("patient_id")?,
            sample_interval_seconds,
        })
    }
}
