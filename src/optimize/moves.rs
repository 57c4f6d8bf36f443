//! Local-search move operators
//!
//! Each operator scores candidate schedules built from copies of the working
//! schedule and commits one only when it beats the current score. The single
//! exception is [`Moves::remove_excess`], which must bring an over-cap
//! schedule back under the injection cap even when that costs accuracy.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::data::{ester_count, Dose, Medication, ReferenceCurve};
use crate::optimize::objective::Objective;
use crate::optimize::rules::{can_place, default_amount, grid_amount, grid_step, switched_amount};
use crate::optimize::state::OptimizationState;
use crate::optimize::OptimizationParams;

/// Strides tried in each direction when adjusting an amount
pub const ADJUST_STEPS: usize = 10;
/// Days either side of the current day tried when relocating
pub const RELOCATE_WINDOW_DAYS: usize = 3;
/// Replacement esters tried per switch, closest half-life first
pub const SWITCH_CANDIDATES: usize = 2;
/// Preferred ester half-life as a fraction of the gap to the next injection
pub const HALF_LIFE_GAP_RATIO: f64 = 0.4;
/// Weight of progesterone when ranking days for new doses
pub const PROGESTERONE_IMPORTANCE_WEIGHT: f64 = 10.0;

const AMOUNT_TOLERANCE: f64 = 1e-9;

/// Precomputed, read-only facts about the search space of one run
#[derive(Debug, Clone)]
pub(crate) struct SearchSpace {
    pub length: usize,
    high_estradiol_days: Vec<usize>,
    high_progesterone_days: Vec<usize>,
    importance_order: Vec<usize>,
    esters: Vec<Arc<Medication>>,
    progesterones: Vec<Arc<Medication>>,
}

impl SearchSpace {
    pub fn new(params: &OptimizationParams, reference: &ReferenceCurve) -> Self {
        let e2_median = reference.median_estradiol();
        let high_estradiol_days = reference
            .points()
            .iter()
            .filter(|p| p.estradiol >= e2_median)
            .map(|p| p.day)
            .collect();
        let high_progesterone_days = match reference.median_progesterone() {
            Some(p4_median) => reference
                .points()
                .iter()
                .filter(|p| p.progesterone.unwrap_or(0.0) >= p4_median)
                .map(|p| p.day)
                .collect(),
            None => Vec::new(),
        };
        let (esters, progesterones): (Vec<_>, Vec<_>) = params
            .medications
            .iter()
            .cloned()
            .partition(|m| m.is_ester());

        Self {
            length: reference.cycle_length(),
            high_estradiol_days,
            high_progesterone_days,
            importance_order: reference.days_by_importance(PROGESTERONE_IMPORTANCE_WEIGHT),
            esters,
            progesterones,
        }
    }

    fn high_value_days(&self, medication: &Medication) -> &[usize] {
        match medication {
            Medication::Ester(_) => &self.high_estradiol_days,
            Medication::Progesterone(_) => &self.high_progesterone_days,
        }
    }
}

/// The move operators, bound to one run's search space and parameters
pub(crate) struct Moves<'a> {
    pub space: &'a SearchSpace,
    pub params: &'a OptimizationParams,
}

impl Moves<'_> {
    /// Drop the ester dose whose removal hurts least, once, if over the cap
    pub fn remove_excess(&self, objective: &mut Objective, state: &mut OptimizationState) -> bool {
        if ester_count(&state.doses) <= self.params.max_injections {
            return false;
        }
        let best = state
            .doses
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_ester())
            .map(|(i, _)| {
                let mut candidate = state.doses.clone();
                candidate.remove(i);
                let score = objective.score(&candidate);
                (candidate, score)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((doses, score)) => {
                tracing::debug!(
                    "Removed one injection to respect the cap of {}",
                    self.params.max_injections
                );
                state.replace(doses, score);
                true
            }
            None => false,
        }
    }

    /// Try nearby amounts for every dose
    pub fn adjust_doses(&self, objective: &mut Objective, state: &mut OptimizationState) -> bool {
        let mut improved = false;
        for i in 0..state.doses.len() {
            let amounts = self.amount_candidates(&state.doses[i], state.granularity_multiplier);
            let best = best_of(objective, amounts.into_iter().map(|amount| {
                let mut candidate = state.doses.clone();
                candidate[i].amount = amount;
                candidate
            }));
            if let Some((doses, score)) = best {
                improved |= state.accept(doses, score);
            }
        }
        improved
    }

    fn amount_candidates(&self, dose: &Dose, multiplier: f64) -> Vec<f64> {
        match dose.medication.as_ref() {
            Medication::Ester(ester) => {
                let concentration = self.params.concentration_of(&ester.name);
                let current = grid_step(dose.amount, concentration, self.params);
                let stride = (multiplier.round() as i64).max(1);
                (1..=ADJUST_STEPS as i64)
                    .flat_map(|j| [current + j * stride, current - j * stride])
                    .filter(|k| *k > 0)
                    .map(|k| grid_amount(k, concentration, self.params))
                    .filter(|a| *a >= self.params.min_dose && *a <= self.params.max_dose)
                    .collect()
            }
            Medication::Progesterone(_) => self
                .params
                .progesterone_doses
                .iter()
                .copied()
                .filter(|a| (a - dose.amount).abs() > AMOUNT_TOLERANCE)
                .collect(),
        }
    }

    /// Try moving every dose to a high-value day or a nearby day
    pub fn relocate_days(&self, objective: &mut Objective, state: &mut OptimizationState) -> bool {
        let mut improved = false;
        for i in 0..state.doses.len() {
            let dose = &state.doses[i];
            let current = dose.day_index().max(0) as usize;
            let window_start = current.saturating_sub(RELOCATE_WINDOW_DAYS);
            let window_end = (current + RELOCATE_WINDOW_DAYS).min(self.space.length - 1);

            let days: BTreeSet<usize> = self
                .space
                .high_value_days(&dose.medication)
                .iter()
                .copied()
                .chain(window_start..=window_end)
                .filter(|&day| (day as f64 - dose.day).abs() > crate::data::dose::SAME_DAY_TOLERANCE)
                .filter(|&day| can_place(&state.doses, &dose.medication, day as f64, Some(i), self.params))
                .collect();

            let best = best_of(objective, days.into_iter().map(|day| {
                let mut candidate = state.doses.clone();
                candidate[i].day = day as f64;
                candidate
            }));
            if let Some((doses, score)) = best {
                improved |= state.accept(doses, score);
            }
        }
        improved
    }

    /// Try replacing each ester with a better-suited ester or with progesterone
    pub fn switch_medications(
        &self,
        objective: &mut Objective,
        state: &mut OptimizationState,
    ) -> bool {
        let mut improved = false;
        for i in 0..state.doses.len() {
            let dose = &state.doses[i];
            if !dose.is_ester() {
                continue;
            }
            let target_half_life = HALF_LIFE_GAP_RATIO * self.gap_to_next_injection(&state.doses, i);

            let mut esters: Vec<(&Arc<Medication>, f64)> = self
                .space
                .esters
                .iter()
                .filter(|m| m.name() != dose.medication.name())
                .filter_map(|m| match m.as_ref() {
                    Medication::Ester(e) => Some((m, (e.half_life() - target_half_life).abs())),
                    Medication::Progesterone(_) => None,
                })
                .collect();
            esters.sort_by(|a, b| a.1.total_cmp(&b.1));

            let targets = esters
                .into_iter()
                .take(SWITCH_CANDIDATES)
                .map(|(m, _)| m)
                .chain(self.space.progesterones.iter())
                .filter(|m| can_place(&state.doses, m, dose.day, Some(i), self.params));

            let best = best_of(objective, targets.map(|target| {
                let mut candidate = state.doses.clone();
                candidate[i] = Dose::new(
                    dose.day,
                    switched_amount(dose, target, self.params),
                    Arc::clone(target),
                );
                candidate
            }));
            if let Some((doses, score)) = best {
                improved |= state.accept(doses, score);
            }
        }
        improved
    }

    /// Days from the ester dose at `index` to the next injection, wrapping around the cycle
    fn gap_to_next_injection(&self, doses: &[Dose], index: usize) -> f64 {
        let length = self.space.length as f64;
        let day = doses[index].day;
        let others: Vec<f64> = doses
            .iter()
            .enumerate()
            .filter(|(j, d)| *j != index && d.is_ester())
            .map(|(_, d)| d.day)
            .collect();
        if others.is_empty() {
            return length;
        }
        others
            .iter()
            .map(|&other| {
                let gap = other - day;
                if gap > 0.0 {
                    gap
                } else {
                    gap + length
                }
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Greedily add default-sized doses on the most important days
    pub fn add_medications(&self, objective: &mut Objective, state: &mut OptimizationState) -> bool {
        let mut improved = false;
        for &day in &self.space.importance_order {
            let day = day as f64;
            for medication in &self.params.medications {
                if !can_place(&state.doses, medication, day, None, self.params) {
                    continue;
                }
                let mut candidate = state.doses.clone();
                candidate.push(Dose::new(
                    day,
                    default_amount(medication, self.params),
                    Arc::clone(medication),
                ));
                let score = objective.score(&candidate);
                improved |= state.accept(candidate, score);
            }
        }
        improved
    }
}

/// Lowest-scoring candidate, if any
fn best_of(
    objective: &mut Objective,
    candidates: impl Iterator<Item = Vec<Dose>>,
) -> Option<(Vec<Dose>, f64)> {
    candidates
        .map(|doses| {
            let score = objective.score(&doses);
            (doses, score)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
