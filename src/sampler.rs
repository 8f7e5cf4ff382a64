use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::records::{ConcentrationRecord, ConcentrationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StratumSummary {
    pub concentration_type: ConcentrationType,
    pub available: usize,
    pub quota: usize,
    pub sampled: usize,
}

/// Ordered working set. Never longer than the sampler's hard cap.
#[derive(Debug, Clone)]
pub struct StratifiedSample {
    pub records: Vec<ConcentrationRecord>,
    pub strata: Vec<StratumSummary>,
    pub total_available: usize,
}

impl StratifiedSample {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StratifiedSampler {
    target_size: usize,
    hard_cap: usize,
}

impl StratifiedSampler {
    pub fn new(target_size: usize, hard_cap: usize) -> Self {
        Self {
            target_size,
            hard_cap,
        }
    }

    /// Equal quota per concentration type with the remainder going to the
    /// lowest discriminators. A short stratum is not topped up from the others.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        records: &[ConcentrationRecord],
        rng: &mut R,
    ) -> StratifiedSample {
        let strata_count = ConcentrationType::ALL.len();
        let base_quota = self.target_size / strata_count;
        let remainder = self.target_size % strata_count;

        let mut selected = Vec::with_capacity(self.target_size.min(records.len()));
        let mut strata = Vec::with_capacity(strata_count);
        for (position, concentration_type) in ConcentrationType::ALL.iter().enumerate() {
            let mut stratum: Vec<&ConcentrationRecord> = records
                .iter()
                .filter(|r| r.concentration_type == *concentration_type)
                .collect();
            let quota = base_quota + usize::from(position < remainder);
            let available = stratum.len();

            stratum.shuffle(rng);
            stratum.truncate(quota);
            selected.extend(stratum.into_iter().cloned());

            strata.push(StratumSummary {
                concentration_type: *concentration_type,
                available,
                quota,
                sampled: 0,
            });
        }

        selected.truncate(self.hard_cap);
        for summary in strata.iter_mut() {
            summary.sampled = selected
                .iter()
                .filter(|r| r.concentration_type == summary.concentration_type)
                .count();
            info!(
                concentration_type = summary.concentration_type.code(),
                available = summary.available,
                quota = summary.quota,
                sampled = summary.sampled,
                "stratum sampled"
            );
        }
        info!(
            total = records.len(),
            sampled = selected.len(),
            cap = self.hard_cap,
            "stratified sample ready"
        );

        StratifiedSample {
            records: selected,
            strata,
            total_available: records.len(),
        }
    }
}
