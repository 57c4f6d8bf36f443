//! Starting candidates for the multi-start search

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::{Dose, Medication, ReferenceCurve};
use crate::optimize::rules::{can_place, default_amount};
use crate::optimize::OptimizationParams;

/// How the doses of a starting candidate are spread over the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitStrategy {
    /// Days with the highest target for the medication's hormone
    HighestReference,
    /// Evenly spaced over the whole cycle
    EvenlySpaced,
    /// Packed into the first third of the cycle
    FrontLoaded,
    /// Distinct days drawn from a seeded generator
    Random,
}

impl InitStrategy {
    /// Strategies used for `params`; [`InitStrategy::Random`] only with a seed
    pub fn for_params(params: &OptimizationParams) -> Vec<InitStrategy> {
        let mut strategies = vec![
            InitStrategy::HighestReference,
            InitStrategy::EvenlySpaced,
            InitStrategy::FrontLoaded,
        ];
        if params.seed.is_some() {
            strategies.push(InitStrategy::Random);
        }
        strategies
    }
}

/// A starting schedule and the strategy that produced it
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub strategy: InitStrategy,
    pub doses: Vec<Dose>,
}

/// One candidate per strategy, each using the next medication round-robin
pub(crate) fn initial_candidates(
    params: &OptimizationParams,
    reference: &ReferenceCurve,
) -> Vec<Candidate> {
    let length = reference.cycle_length();
    let mut rng = params.seed.map(StdRng::seed_from_u64);

    InitStrategy::for_params(params)
        .into_iter()
        .enumerate()
        .map(|(i, strategy)| {
            let medication = &params.medications[i % params.medications.len()];
            let count = dose_count(medication, params, length);
            let days = match strategy {
                InitStrategy::HighestReference => highest_days(medication, reference, count),
                InitStrategy::EvenlySpaced => evenly_spaced_days(length, count),
                InitStrategy::FrontLoaded => front_loaded_days(length, count),
                InitStrategy::Random => match rng.as_mut() {
                    Some(rng) => random_days(rng, length, count),
                    None => Vec::new(),
                },
            };
            Candidate {
                strategy,
                doses: place(medication, &days, params),
            }
        })
        .collect()
}

fn dose_count(medication: &Medication, params: &OptimizationParams, length: usize) -> usize {
    let wanted = if medication.is_ester() {
        params.max_injections
    } else {
        params.max_injections.max(1)
    };
    wanted.min(length)
}

fn place(medication: &Arc<Medication>, days: &[usize], params: &OptimizationParams) -> Vec<Dose> {
    let amount = default_amount(medication, params);
    let mut doses = Vec::with_capacity(days.len());
    for &day in days {
        let day = day as f64;
        if can_place(&doses, medication, day, None, params) {
            doses.push(Dose::new(day, amount, Arc::clone(medication)));
        }
    }
    doses
}

fn highest_days(medication: &Medication, reference: &ReferenceCurve, count: usize) -> Vec<usize> {
    let mut days: Vec<(usize, f64)> = reference
        .points()
        .iter()
        .map(|p| {
            let value = if medication.is_ester() {
                p.estradiol
            } else {
                p.progesterone.unwrap_or(p.estradiol)
            };
            (p.day, value)
        })
        .collect();
    days.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut chosen: Vec<usize> = days.into_iter().take(count).map(|(d, _)| d).collect();
    chosen.sort_unstable();
    chosen
}

fn evenly_spaced_days(length: usize, count: usize) -> Vec<usize> {
    (0..count).map(|i| i * length / count).collect()
}

fn front_loaded_days(length: usize, count: usize) -> Vec<usize> {
    let span = (length / 3).max(1);
    let days: BTreeSet<usize> = (0..count).map(|i| i * span / count).collect();
    days.into_iter().collect()
}

fn random_days(rng: &mut StdRng, length: usize, count: usize) -> Vec<usize> {
    let mut days = rand::seq::index::sample(rng, length, count).into_vec();
    days.sort_unstable();
    days
}
