use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::medication::Medication;
use crate::simulator::{total_concentration, ConcentrationPoint};

/// Days closer than this are treated as the same calendar day
pub(crate) const SAME_DAY_TOLERANCE: f64 = 1e-6;

/// A single administration of a medication
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dose {
    /// Day of administration, relative to the start of the cycle
    pub day: f64,
    /// Amount in mg
    pub amount: f64,
    pub medication: Arc<Medication>,
}

impl Dose {
    pub fn new(day: f64, amount: f64, medication: Arc<Medication>) -> Self {
        Self {
            day,
            amount,
            medication,
        }
    }

    pub fn is_ester(&self) -> bool {
        self.medication.is_ester()
    }

    /// Day rounded to the nearest whole day
    pub fn day_index(&self) -> i64 {
        self.day.round() as i64
    }

    pub(crate) fn same_slot(&self, other: &Dose) -> bool {
        (self.day - other.day).abs() < SAME_DAY_TOLERANCE
            && self.medication.name() == other.medication.name()
    }

    /// Copy of this dose moved by `offset` days
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            day: self.day + offset,
            amount: self.amount,
            medication: Arc::clone(&self.medication),
        }
    }
}

/// Ordering used before consolidation: by day, then medication name
pub(crate) fn by_day_then_name(a: &Dose, b: &Dose) -> Ordering {
    a.day
        .partial_cmp(&b.day)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.medication.name().cmp(b.medication.name()))
}

/// Number of ester (injected) doses
pub fn ester_count(doses: &[Dose]) -> usize {
    doses.iter().filter(|d| d.is_ester()).count()
}

/// Copies of every dose shifted back by `1..=cycles` whole cycle lengths
///
/// The originals are included, so the result holds `cycles + 1` copies.
pub fn with_prior_cycles(doses: &[Dose], cycle_length: f64, cycles: usize) -> Vec<Dose> {
    let mut all = Vec::with_capacity(doses.len() * (cycles + 1));
    all.extend(doses.iter().cloned());
    for cycle in 1..=cycles {
        let offset = -(cycle as f64) * cycle_length;
        all.extend(doses.iter().map(|d| d.shifted(offset)));
    }
    all
}

/// A repeating dosing regimen
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Schedule {
    pub doses: Vec<Dose>,
    /// Repetition period in days
    pub cycle_length: usize,
    /// Include residual concentration from earlier cycles
    pub steady_state: bool,
}

impl Schedule {
    pub fn new(doses: Vec<Dose>, cycle_length: usize, steady_state: bool) -> Self {
        Self {
            doses,
            cycle_length,
            steady_state,
        }
    }

    /// Doses to simulate, including virtual prior cycles when at steady state
    pub fn virtual_doses(&self, prior_cycles: usize) -> Vec<Dose> {
        if self.steady_state {
            with_prior_cycles(&self.doses, self.cycle_length as f64, prior_cycles)
        } else {
            self.doses.clone()
        }
    }

    /// Concentration curve of this schedule over `times`
    pub fn concentration(&self, times: &[f64]) -> Vec<ConcentrationPoint> {
        total_concentration(
            &self.virtual_doses(crate::optimize::STEADY_STATE_CYCLES),
            times,
        )
    }
}
