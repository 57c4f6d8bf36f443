//! Dosing schedule optimization
//!
//! A multi-start local search over discrete schedules. Each starting
//! candidate is improved by repeated passes of five moves (remove excess
//! injections, adjust amounts, relocate days, switch medications and add
//! doses) until it stalls at the finest step size. The best feasible
//! schedule is then consolidated and rounded to administrable amounts.
//!
//! The search runs in slices through [`ScheduleOptimizer::resume`], so a
//! caller can report progress or stop early by simply not resuming.

pub mod consolidate;
mod engine;
mod init;
mod moves;
mod objective;
mod params;
mod rules;
mod state;

pub use consolidate::{consolidate, finalize, round_doses};
pub use engine::{
    find_best_injection_count, optimize, optimize_with_progress, InjectionCountResult,
    OptimizationResult, Progress, ScheduleOptimizer, Step, MAX_PENDING_PERCENT,
    PROGRESS_SCALE_ITERATIONS,
};
pub use init::InitStrategy;
pub use moves::{
    ADJUST_STEPS, HALF_LIFE_GAP_RATIO, PROGESTERONE_IMPORTANCE_WEIGHT, RELOCATE_WINDOW_DAYS,
    SWITCH_CANDIDATES,
};
pub use objective::{
    multi_objective_score, normalized_mse, DOSE_COMPLEXITY_WEIGHT, MSE_GRID_STEP_DAYS,
    SAMPLES_PER_DAY, SIMPLICITY_WEIGHT, STEADY_STATE_CYCLES,
};
pub use params::{OptimizationParams, SearchTuning};
pub use rules::{PROGESTERONE_REPEATS_PER_DAY, START_VOLUME_ML};
