use crate::data::Dose;

/// Best schedule seen so far, kept apart from the working schedule
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub score: f64,
    pub doses: Vec<Dose>,
}

/// Mutable working state of one search
///
/// Owned by a single run; moves replace `doses` only after a candidate has
/// been scored better than the current schedule.
#[derive(Debug, Clone)]
pub(crate) struct OptimizationState {
    pub doses: Vec<Dose>,
    pub score: f64,
    pub iteration: usize,
    pub no_improvement: usize,
    pub since_refinement: usize,
    pub granularity_multiplier: f64,
    pub best: Snapshot,
}

impl OptimizationState {
    pub fn new(doses: Vec<Dose>, score: f64, granularity_multiplier: f64) -> Self {
        Self {
            best: Snapshot {
                score,
                doses: doses.clone(),
            },
            doses,
            score,
            iteration: 0,
            no_improvement: 0,
            since_refinement: 0,
            granularity_multiplier,
        }
    }

    /// Replace the working schedule if `score` beats it
    pub fn accept(&mut self, doses: Vec<Dose>, score: f64) -> bool {
        if score < self.score {
            self.replace(doses, score);
            true
        } else {
            false
        }
    }

    /// Replace the working schedule unconditionally
    pub fn replace(&mut self, doses: Vec<Dose>, score: f64) {
        self.doses = doses;
        self.score = score;
    }

    /// Record the working schedule as the best if it is, and `feasible`
    pub fn remember_if_best(&mut self, feasible: bool) {
        if feasible && self.score < self.best.score {
            self.best = Snapshot {
                score: self.score,
                doses: self.doses.clone(),
            };
        }
    }
}
