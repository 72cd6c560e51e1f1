use serde::{Deserialize, Serialize};

use super::LatestSnapshot;
use crate::models::Patient;

/// Closed interval `[min, max]` of degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBand {
    pub min: f64,
    pub max: f64,
}

impl TemperatureBand {
    pub fn contains(&self, temperature_c: f64) -> bool {
        self.min <= temperature_c && temperature_c <= self.max
    }
}

/// Named triage filters shown on the dashboard. The bands are fixed policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageRange {
    #[default]
    All,
    Low,
    Moderate,
    High,
}

const LOW: TemperatureBand = TemperatureBand { min: 0.0, max: 37.4 };
const MODERATE: TemperatureBand = TemperatureBand { min: 37.5, max: 38.9 };
const HIGH: TemperatureBand = TemperatureBand { min: 39.0, max: 50.0 };

impl TriageRange {
    /// `None` for [`TriageRange::All`], which is unconstrained.
    pub fn band(self) -> Option<TemperatureBand> {
        match self {
            TriageRange::All => None,
            TriageRange::Low => Some(LOW),
            TriageRange::Moderate => Some(MODERATE),
            TriageRange::High => Some(HIGH),
        }
    }

    /// The named band a reading falls into. Readings between bands (for
    /// example 37.45) or outside all of them classify as `None`.
    pub fn classify(temperature_c: f64) -> Option<TriageRange> {
        [TriageRange::Low, TriageRange::Moderate, TriageRange::High]
            .into_iter()
            .find(|range| range.band().is_some_and(|b| b.contains(temperature_c)))
    }
}

/// Patients whose latest reading lies within `range`, in roster order.
///
/// `All` returns the roster unchanged, including patients with no reading.
/// Every other range excludes patients that have no snapshot.
pub fn filter_by_range(
    patients: &[Patient],
    latest: &LatestSnapshot,
    range: TriageRange,
) -> Vec<Patient> {
    let Some(band) = range.band() else {
        return patients.to_vec();
    };

    patients
        .iter()
        .filter(|p| {
            latest
                .get(&p.patient_id)
                .is_some_and(|s| band.contains(s.temperature_c))
        })
        .cloned()
        .collect()
}
