//! Post-processing of a finished search into an administrable schedule

use crate::data::dose::by_day_then_name;
use crate::data::{Dose, Medication, Route};
use crate::optimize::OptimizationParams;

/// Merge doses of the same medication on the same day by summing amounts
///
/// The result is sorted by day, then by medication name.
pub fn consolidate(doses: &[Dose]) -> Vec<Dose> {
    let mut sorted = doses.to_vec();
    sorted.sort_by(by_day_then_name);

    let mut merged: Vec<Dose> = Vec::with_capacity(sorted.len());
    for dose in sorted {
        match merged.last_mut() {
            Some(last) if last.same_slot(&dose) => last.amount += dose.amount,
            _ => merged.push(dose),
        }
    }
    merged
}

/// Round every dose to an amount that can actually be given
///
/// Ester volumes snap to the granularity and are capped at `max_dose`;
/// injections that end below `min_dose` are dropped. Oral and vaginal
/// progesterone snap to a multiple of the smallest allowed dose, rectal
/// progesterone to the nearest allowed dose. Progesterone rounding to zero
/// is dropped.
pub fn round_doses(doses: Vec<Dose>, params: &OptimizationParams) -> Vec<Dose> {
    doses
        .into_iter()
        .filter_map(|mut dose| {
            let amount = match dose.medication.as_ref() {
                Medication::Ester(ester) => {
                    let concentration = params.concentration_of(&ester.name);
                    let volume = (dose.amount / concentration / params.granularity).round()
                        * params.granularity;
                    let amount = (volume * concentration).min(params.max_dose);
                    if amount < params.min_dose || amount <= 0.0 {
                        return None;
                    }
                    amount
                }
                Medication::Progesterone(route) => {
                    let amount = match route.route {
                        Route::Oral | Route::Vaginal => {
                            let unit = params.smallest_progesterone_dose();
                            (dose.amount / unit).round() * unit
                        }
                        Route::Rectal => nearest(&params.progesterone_doses, dose.amount),
                    };
                    if amount <= 0.0 {
                        return None;
                    }
                    amount
                }
            };
            dose.amount = amount;
            Some(dose)
        })
        .collect()
}

/// Consolidate, then round
pub fn finalize(doses: &[Dose], params: &OptimizationParams) -> Vec<Dose> {
    round_doses(consolidate(doses), params)
}

fn nearest(allowed: &[f64], amount: f64) -> f64 {
    allowed
        .iter()
        .copied()
        .min_by(|a, b| (a - amount).abs().total_cmp(&(b - amount).abs()))
        .unwrap_or(0.0)
}
