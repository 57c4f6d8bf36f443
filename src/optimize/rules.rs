//! Hard placement constraints and medication-specific dose sizing

use std::sync::Arc;

use crate::data::{ester_count, Dose, Medication, Route};
use crate::optimize::OptimizationParams;

/// Volume (mL) of a freshly placed ester dose
pub const START_VOLUME_ML: f64 = 0.1;
/// Oral or vaginal progesterone doses allowed on one day before consolidation
pub const PROGESTERONE_REPEATS_PER_DAY: usize = 3;

const GRID_SLACK: f64 = 1e-9;

fn on_day(dose: &Dose, day: f64) -> bool {
    (dose.day - day).abs() < crate::data::dose::SAME_DAY_TOLERANCE
}

/// Whether `medication` may be given on `day` alongside `doses`
///
/// `replacing` names a dose that is being moved or swapped and is ignored
/// when counting.
pub(crate) fn can_place(
    doses: &[Dose],
    medication: &Medication,
    day: f64,
    replacing: Option<usize>,
    params: &OptimizationParams,
) -> bool {
    let others = || {
        doses
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != replacing)
            .map(|(_, d)| d)
    };
    let same_medication_today = others()
        .filter(|d| on_day(d, day) && d.medication.name() == medication.name())
        .count();

    match medication {
        Medication::Ester(_) => {
            let injections = others().filter(|d| d.is_ester()).count();
            same_medication_today == 0 && injections < params.max_injections
        }
        Medication::Progesterone(route) => match route.route {
            Route::Rectal => same_medication_today == 0,
            Route::Oral | Route::Vaginal => same_medication_today < PROGESTERONE_REPEATS_PER_DAY,
        },
    }
}

/// Whether a whole schedule satisfies every placement rule
pub(crate) fn is_feasible(doses: &[Dose], params: &OptimizationParams) -> bool {
    ester_count(doses) <= params.max_injections
        && doses.iter().enumerate().all(|(i, dose)| {
            let same = doses
                .iter()
                .enumerate()
                .filter(|(j, d)| *j != i && dose.same_slot(d))
                .count();
            match dose.medication.as_ref() {
                Medication::Ester(_) => same == 0,
                Medication::Progesterone(route) if route.route == Route::Rectal => same == 0,
                Medication::Progesterone(_) => same < PROGESTERONE_REPEATS_PER_DAY,
            }
        })
}

/// Amount of `k` granularity steps of an ester at `concentration` mg/mL
///
/// Final rounding computes amounts the same way, so amounts built here
/// survive it unchanged.
pub(crate) fn grid_amount(k: i64, concentration: f64, params: &OptimizationParams) -> f64 {
    (k as f64 * params.granularity) * concentration
}

/// Nearest granularity step to `amount`
pub(crate) fn grid_step(amount: f64, concentration: f64, params: &OptimizationParams) -> i64 {
    (amount / concentration / params.granularity).round() as i64
}

/// Ester amount for `volume` mL, snapped onto the granularity grid and into the dose bounds
///
/// When no step lies within the bounds the smallest step above `min_dose`
/// is used, capped at `max_dose`.
pub(crate) fn ester_amount(volume: f64, concentration: f64, params: &OptimizationParams) -> f64 {
    let per_step = concentration * params.granularity;
    let mut lowest = ((params.min_dose / per_step) - GRID_SLACK).ceil().max(1.0) as i64;
    while grid_amount(lowest, concentration, params) < params.min_dose {
        lowest += 1;
    }
    let mut highest = ((params.max_dose / per_step) + GRID_SLACK).floor() as i64;
    while highest > lowest && grid_amount(highest, concentration, params) > params.max_dose {
        highest -= 1;
    }
    let k = ((volume / params.granularity).round() as i64).clamp(lowest, highest.max(lowest));
    grid_amount(k, concentration, params).min(params.max_dose)
}

/// Amount used when a medication is first placed
pub(crate) fn default_amount(medication: &Medication, params: &OptimizationParams) -> f64 {
    match medication {
        Medication::Ester(ester) => {
            ester_amount(START_VOLUME_ML, params.concentration_of(&ester.name), params)
        }
        Medication::Progesterone(_) => params.smallest_progesterone_dose(),
    }
}

/// Amount after switching the dose at `dose` to `target`
///
/// Ester to ester keeps the injected volume; anything else starts from the
/// target's default amount.
pub(crate) fn switched_amount(
    dose: &Dose,
    target: &Arc<Medication>,
    params: &OptimizationParams,
) -> f64 {
    match (dose.medication.as_ref(), target.as_ref()) {
        (Medication::Ester(from), Medication::Ester(to)) => {
            let volume = dose.amount / params.concentration_of(&from.name);
            ester_amount(volume, params.concentration_of(&to.name), params)
        }
        _ => default_amount(target, params),
    }
}
