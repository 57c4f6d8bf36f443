//! Scoring of candidate schedules against the reference curve

use std::fmt::Write;

use cached::{Cached, UnboundCache};

use crate::data::{ester_count, with_prior_cycles, Dose, ReferenceCurve};
use crate::simulator::{generate_time_grid, interpolate, total_concentration};

/// Prior cycles prepended when evaluating at steady state
pub const STEADY_STATE_CYCLES: usize = 3;
/// Sampling step of the simulated curve
pub const MSE_GRID_STEP_DAYS: f64 = 0.5;
/// Evenly spaced samples compared against each reference day
pub const SAMPLES_PER_DAY: usize = 4;
/// Penalty per ester injection
pub const SIMPLICITY_WEIGHT: f64 = 0.002;
/// Penalty per distinct dose amount
pub const DOSE_COMPLEXITY_WEIGHT: f64 = 0.001;

const AMOUNT_TOLERANCE: f64 = 1e-9;

/// Mean squared relative error of the simulated curve against `reference`
///
/// The reference is looked up by whole day and wraps when shorter than
/// `schedule_length`. Estradiol and progesterone errors are averaged
/// separately and then together when the reference has progesterone
/// targets. Days whose target is zero are skipped since the relative error
/// is undefined there.
pub fn normalized_mse(
    doses: &[Dose],
    reference: &ReferenceCurve,
    schedule_length: usize,
    steady_state: bool,
) -> f64 {
    let simulated = if steady_state {
        with_prior_cycles(doses, schedule_length as f64, STEADY_STATE_CYCLES)
    } else {
        doses.to_vec()
    };
    let grid = generate_time_grid(schedule_length as f64, MSE_GRID_STEP_DAYS);
    let series = total_concentration(&simulated, &grid);
    if series.is_empty() {
        return 0.0;
    }

    let (mut e2_sum, mut e2_n) = (0.0, 0usize);
    let (mut p4_sum, mut p4_n) = (0.0, 0usize);
    for day in 0..schedule_length {
        let target = reference.at(day);
        for sample in 0..SAMPLES_PER_DAY {
            let t = day as f64 + sample as f64 / SAMPLES_PER_DAY as f64;
            let point = interpolate(&series, MSE_GRID_STEP_DAYS, t);
            if target.estradiol > 0.0 {
                e2_sum += ((point.estradiol - target.estradiol) / target.estradiol).powi(2);
                e2_n += 1;
            }
            if let Some(p4) = target.progesterone.filter(|p4| *p4 > 0.0) {
                p4_sum += ((point.progesterone - p4) / p4).powi(2);
                p4_n += 1;
            }
        }
    }

    let e2_mse = if e2_n > 0 { e2_sum / e2_n as f64 } else { 0.0 };
    if p4_n > 0 {
        (e2_mse + p4_sum / p4_n as f64) / 2.0
    } else {
        e2_mse
    }
}

/// Accuracy plus simplicity penalties; lower is better
pub fn multi_objective_score(doses: &[Dose], mse: f64, accuracy_only: bool) -> f64 {
    if accuracy_only {
        return mse;
    }
    let injections = ester_count(doses) as f64;
    mse + injections * SIMPLICITY_WEIGHT + unique_amounts(doses) as f64 * DOSE_COMPLEXITY_WEIGHT
}

fn unique_amounts(doses: &[Dose]) -> usize {
    let mut amounts: Vec<f64> = doses.iter().map(|d| d.amount).collect();
    amounts.sort_by(|a, b| a.total_cmp(b));
    amounts.dedup_by(|a, b| (*a - *b).abs() < AMOUNT_TOLERANCE);
    amounts.len()
}

/// Canonical text form of a dose multiset, independent of dose order
pub(crate) fn cache_key(doses: &[Dose]) -> String {
    let mut entries: Vec<(f64, &str, f64)> = doses
        .iter()
        .map(|d| (d.day, d.medication.name(), d.amount))
        .collect();
    entries.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.total_cmp(&b.2))
    });
    let mut key = String::with_capacity(entries.len() * 32);
    for (day, name, amount) in entries {
        let _ = write!(key, "{:.4}@{}={:.6};", day, name, amount);
    }
    key
}

/// Memoized objective owned by a single optimization run
pub(crate) struct Objective {
    reference: ReferenceCurve,
    schedule_length: usize,
    steady_state: bool,
    accuracy_only: bool,
    cache: UnboundCache<String, f64>,
}

impl Objective {
    pub(crate) fn new(
        reference: ReferenceCurve,
        schedule_length: usize,
        steady_state: bool,
        accuracy_only: bool,
    ) -> Self {
        Self {
            reference,
            schedule_length,
            steady_state,
            accuracy_only,
            cache: UnboundCache::new(),
        }
    }

    pub(crate) fn mse(&mut self, doses: &[Dose]) -> f64 {
        let key = cache_key(doses);
        if let Some(mse) = self.cache.cache_get(&key) {
            return *mse;
        }
        let mse = normalized_mse(
            doses,
            &self.reference,
            self.schedule_length,
            self.steady_state,
        );
        self.cache.cache_set(key, mse);
        mse
    }

    /// MSE computed afresh, bypassing the cache
    pub(crate) fn exact_mse(&self, doses: &[Dose]) -> f64 {
        normalized_mse(
            doses,
            &self.reference,
            self.schedule_length,
            self.steady_state,
        )
    }

    pub(crate) fn score(&mut self, doses: &[Dose]) -> f64 {
        let mse = self.mse(doses);
        multi_objective_score(doses, mse, self.accuracy_only)
    }

    pub(crate) fn clear(&mut self) {
        self.cache.cache_clear();
    }

    pub(crate) fn cache_stats(&self) -> (usize, u64, u64) {
        (
            self.cache.cache_size(),
            self.cache.cache_hits().unwrap_or(0),
            self.cache.cache_misses().unwrap_or(0),
        )
    }
}
