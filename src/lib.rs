//! Hormone concentration simulation and dosing schedule optimization
//!
//! `hormosol` models the serum estradiol produced by depot injections of
//! estradiol esters and the serum progesterone produced by oral, vaginal or
//! rectal progesterone, and searches for a repeating dosing schedule whose
//! curve tracks a reference curve.

pub mod data;
pub mod error;
pub mod logger;
pub mod optimize;
pub mod simulator;

pub use error::HormosolError;

pub mod prelude {
    pub use crate::data::medication as catalog;
    pub use crate::data::{
        ester_count, with_prior_cycles, Dose, Ester, Medication, ProgesteroneRoute,
        ReferenceCurve, ReferencePoint, Route, Schedule,
    };
    pub use crate::logger::setup_log;
    pub use crate::optimize::{
        find_best_injection_count, optimize, optimize_with_progress, InitStrategy,
        InjectionCountResult, OptimizationParams, OptimizationResult, Progress,
        ScheduleOptimizer, SearchTuning, Step,
    };
    pub use crate::simulator::{
        dose_concentration, generate_time_grid, total_concentration, write_csv,
        ConcentrationPoint,
    };
    pub use crate::HormosolError;
}
