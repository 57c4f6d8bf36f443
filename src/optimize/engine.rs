//! Resumable driver of the multi-start local search

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::{Dose, ReferenceCurve, Schedule};
use crate::optimize::consolidate::finalize;
use crate::optimize::init::initial_candidates;
use crate::optimize::moves::{Moves, SearchSpace};
use crate::optimize::objective::Objective;
use crate::optimize::rules::is_feasible;
use crate::optimize::state::{OptimizationState, Snapshot};
use crate::optimize::{OptimizationParams, SearchTuning};
use crate::HormosolError;

/// Iterations over which reported progress approaches 63%
pub const PROGRESS_SCALE_ITERATIONS: f64 = 15.0;
/// Highest percentage reported before the search has finished
pub const MAX_PENDING_PERCENT: f64 = 99.0;

const SCORE_TIE_TOLERANCE: f64 = 1e-9;

/// Snapshot handed to the caller between slices of work
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Estimated completion in `[0, 100]`
    pub percent: f64,
    /// Best score found so far
    pub score: f64,
    /// Local-search iterations completed over all candidates
    pub iteration: usize,
}

/// Final schedule of an optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Consolidated and rounded doses, sorted by day
    pub doses: Vec<Dose>,
    /// Normalized MSE of `doses`, without simplicity penalties
    pub score: f64,
    pub iterations: usize,
    pub cycle_length: usize,
    pub steady_state: bool,
}

impl OptimizationResult {
    pub fn to_schedule(&self) -> Schedule {
        Schedule::new(self.doses.clone(), self.cycle_length, self.steady_state)
    }

    pub fn injection_count(&self) -> usize {
        crate::data::ester_count(&self.doses)
    }
}

/// Outcome of one call to [`ScheduleOptimizer::resume`]
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Yielded(Progress),
    Finished(OptimizationResult),
}

/// An optimization run that can be advanced a slice at a time
///
/// ```rust,no_run
/// use hormosol::prelude::*;
///
/// # fn main() -> Result<(), HormosolError> {
/// let reference = ReferenceCurve::constant(7, 200.0, None)?;
/// let ev = catalog::find(catalog::ESTRADIOL_VALERATE).unwrap();
/// let mut optimizer = ScheduleOptimizer::new(OptimizationParams::new(vec![ev], reference))?;
/// let result = loop {
///     match optimizer.resume() {
///         Step::Yielded(progress) => println!("{:.0}%", progress.percent),
///         Step::Finished(result) => break result,
///     }
/// };
/// println!("{} doses, MSE {:.4}", result.doses.len(), result.score);
/// # Ok(())
/// # }
/// ```
pub struct ScheduleOptimizer {
    params: OptimizationParams,
    space: SearchSpace,
    objective: Objective,
    pending: VecDeque<OptimizationState>,
    active: Option<OptimizationState>,
    best: Option<Snapshot>,
    iterations: usize,
    result: Option<OptimizationResult>,
}

impl ScheduleOptimizer {
    /// Validate `params` and score the starting candidates
    pub fn new(params: OptimizationParams) -> Result<Self, HormosolError> {
        params.validate()?;
        let length = params.cycle_length();
        let reference: ReferenceCurve = params.reference.tile(length);
        let space = SearchSpace::new(&params, &reference);
        let candidates = initial_candidates(&params, &reference);

        let mut objective = Objective::new(
            reference,
            length,
            params.steady_state,
            params.accuracy_only,
        );
        objective.clear();

        let mut scored: Vec<(f64, Vec<Dose>)> = candidates
            .into_iter()
            .map(|candidate| {
                let score = objective.score(&candidate.doses);
                tracing::debug!(
                    "Starting candidate {:?}: {} doses, score {:.6}",
                    candidate.strategy,
                    candidate.doses.len(),
                    score
                );
                (score, candidate.doses)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let initial_multiplier = params.tuning.initial_granularity_multiplier;
        let pending: VecDeque<OptimizationState> = scored
            .into_iter()
            .take(params.beam_width)
            .map(|(score, doses)| OptimizationState::new(doses, score, initial_multiplier))
            .collect();

        tracing::info!(
            "Optimizing a {}-day schedule with {} medication(s), {} starting candidate(s)",
            length,
            params.medications.len(),
            pending.len()
        );

        Ok(Self {
            params,
            space,
            objective,
            pending,
            active: None,
            best: None,
            iterations: 0,
            result: None,
        })
    }

    /// Run until the next yield point or until the search finishes
    ///
    /// Once finished, further calls return the same result.
    pub fn resume(&mut self) -> Step {
        if let Some(result) = &self.result {
            return Step::Finished(result.clone());
        }

        let mut ran = 0;
        while ran < self.params.tuning.yield_interval {
            let mut state = match self.active.take().or_else(|| self.pending.pop_front()) {
                Some(state) => state,
                None => return Step::Finished(self.finish()),
            };

            let moves = Moves {
                space: &self.space,
                params: &self.params,
            };
            let converged = iterate(&moves, &self.params.tuning, &mut self.objective, &mut state);
            self.iterations += 1;
            ran += 1;

            if converged {
                tracing::debug!(
                    "Candidate converged after {} iterations, best score {:.6}",
                    state.iteration,
                    state.best.score
                );
                self.keep_best(state.best);
            } else {
                self.active = Some(state);
            }
        }
        Step::Yielded(self.progress())
    }

    /// Drive the search to completion
    pub fn run(self) -> OptimizationResult {
        self.run_with(|_| {})
    }

    /// Drive the search to completion, reporting progress at every yield
    ///
    /// The last report always has `percent == 100`.
    pub fn run_with<F>(mut self, mut on_progress: F) -> OptimizationResult
    where
        F: FnMut(&Progress),
    {
        loop {
            match self.resume() {
                Step::Yielded(progress) => on_progress(&progress),
                Step::Finished(result) => {
                    on_progress(&Progress {
                        percent: 100.0,
                        score: result.score,
                        iteration: result.iterations,
                    });
                    return result;
                }
            }
        }
    }

    pub fn progress(&self) -> Progress {
        let percent = 100.0 * (1.0 - (-(self.iterations as f64) / PROGRESS_SCALE_ITERATIONS).exp());
        let leader = self
            .best
            .iter()
            .chain(self.active.iter().map(|s| &s.best))
            .min_by(|a, b| a.score.total_cmp(&b.score));
        let score = self
            .objective
            .exact_mse(leader.map(|b| b.doses.as_slice()).unwrap_or_default());
        Progress {
            percent: percent.min(MAX_PENDING_PERCENT),
            score,
            iteration: self.iterations,
        }
    }

    fn keep_best(&mut self, snapshot: Snapshot) {
        match &self.best {
            Some(best) if best.score <= snapshot.score => {}
            _ => self.best = Some(snapshot),
        }
    }

    fn finish(&mut self) -> OptimizationResult {
        let best = self.best.take().map(|b| b.doses).unwrap_or_default();
        let doses = finalize(&best, &self.params);
        let score = self.objective.exact_mse(&doses);

        let (entries, hits, misses) = self.objective.cache_stats();
        tracing::debug!(
            "Objective cache: {} entries, {} hits, {} misses",
            entries,
            hits,
            misses
        );
        tracing::info!(
            "Finished after {} iterations: {} doses, MSE {:.6}",
            self.iterations,
            doses.len(),
            score
        );

        let result = OptimizationResult {
            doses,
            score,
            iterations: self.iterations,
            cycle_length: self.params.cycle_length(),
            steady_state: self.params.steady_state,
        };
        self.result = Some(result.clone());
        result
    }
}

/// One pass of every move, then the convergence bookkeeping
///
/// Returns true once the candidate has converged.
fn iterate(
    moves: &Moves<'_>,
    tuning: &SearchTuning,
    objective: &mut Objective,
    state: &mut OptimizationState,
) -> bool {
    let previous = state.score;

    moves.remove_excess(objective, state);
    moves.adjust_doses(objective, state);
    moves.relocate_days(objective, state);
    moves.switch_medications(objective, state);
    moves.add_medications(objective, state);

    state.iteration += 1;
    state.remember_if_best(is_feasible(&state.doses, moves.params));
    update_convergence(state, tuning, previous)
}

fn update_convergence(state: &mut OptimizationState, tuning: &SearchTuning, previous: f64) -> bool {
    if previous - state.score > tuning.min_improvement {
        state.no_improvement = 0;
        state.since_refinement = 0;
        return false;
    }

    state.no_improvement += 1;
    state.since_refinement += 1;

    if state.since_refinement >= tuning.refine_trigger
        && state.granularity_multiplier > tuning.min_granularity_multiplier
    {
        state.granularity_multiplier =
            (state.granularity_multiplier / 2.0).max(tuning.min_granularity_multiplier);
        state.no_improvement = 0;
        state.since_refinement = 0;
        tracing::debug!(
            "Refining step to {:.2}x granularity",
            state.granularity_multiplier
        );
        return false;
    }

    state.no_improvement >= tuning.convergence_patience
        && state.granularity_multiplier <= tuning.min_granularity_multiplier
}

/// Optimize a schedule in one call
pub fn optimize(params: OptimizationParams) -> Result<OptimizationResult, HormosolError> {
    Ok(ScheduleOptimizer::new(params)?.run())
}

/// Optimize a schedule, reporting progress between slices of work
pub fn optimize_with_progress<F>(
    params: OptimizationParams,
    on_progress: F,
) -> Result<OptimizationResult, HormosolError>
where
    F: FnMut(&Progress),
{
    Ok(ScheduleOptimizer::new(params)?.run_with(on_progress))
}

/// Most accurate schedule found over injection caps `1..=max_injections`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionCountResult {
    /// Cap that produced `result`
    pub injections: usize,
    pub result: OptimizationResult,
}

/// Run an accuracy-only search for every cap up to `max_injections`
///
/// Ties within a small tolerance go to the smaller cap.
pub fn find_best_injection_count(
    params: &OptimizationParams,
    max_injections: usize,
) -> Result<InjectionCountResult, HormosolError> {
    if max_injections == 0 {
        return Err(HormosolError::invalid_parameter("max_injections", 0));
    }

    let mut best: Option<InjectionCountResult> = None;
    for injections in 1..=max_injections {
        let result = optimize(
            params
                .clone()
                .with_max_injections(injections)
                .with_accuracy_only(true),
        )?;
        tracing::info!("{} injection(s): MSE {:.6}", injections, result.score);

        let better = match &best {
            Some(current) => result.score < current.result.score - SCORE_TIE_TOLERANCE,
            None => true,
        };
        if better {
            best = Some(InjectionCountResult { injections, result });
        }
    }
    best.ok_or_else(|| HormosolError::invalid_parameter("max_injections", max_injections))
}
