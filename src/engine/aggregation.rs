use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::models::{PatientId, TemperatureSample};

/// Most recent reading per patient. Patients without samples have no key.
pub type LatestSnapshot = HashMap<PatientId, TemperatureSample>;

/// Picks, per patient, the sample with the greatest timestamp.
///
/// When two samples for the same patient share a timestamp the one seen last
/// in input order wins. Callers should not depend on which one that is.
pub fn latest_per_patient(samples: &[TemperatureSample]) -> LatestSnapshot {
    reduce_latest(samples.iter())
}

/// Same reduction as [`latest_per_patient`], restricted to the samples that
/// [`window_filter`] would keep. Used by the detail view, where readings older
/// than the lookback are not considered current.
pub fn latest_within_window(
    samples: &[TemperatureSample],
    now: DateTime<Utc>,
    window_seconds: NonZeroU32,
) -> LatestSnapshot {
    let cutoff = cutoff(now, window_seconds);
    reduce_latest(samples.iter().filter(|s| s.timestamp > cutoff))
}

/// Keeps samples strictly newer than `now - window_seconds`, in input order.
pub fn window_filter(
    samples: &[TemperatureSample],
    now: DateTime<Utc>,
    window_seconds: NonZeroU32,
) -> Vec<TemperatureSample> {
    let cutoff = cutoff(now, window_seconds);
    samples
        .iter()
        .filter(|s| s.timestamp > cutoff)
        .copied()
        .collect()
}

fn cutoff(now: DateTime<Utc>, window_seconds: NonZeroU32) -> DateTime<Utc> {
    now - Duration::seconds(i64::from(window_seconds.get()))
}

fn reduce_latest<'a>(samples: impl Iterator<Item = &'a TemperatureSample>) -> LatestSnapshot {
    let mut latest: LatestSnapshot = HashMap::new();
    for sample in samples {
        latest
            .entry(sample.patient_id)
            .and_modify(|current| {
                if sample.timestamp >= current.timestamp {
                    *current = *sample;
                }
            })
            .or_insert(*sample);
    }
    latest
}
