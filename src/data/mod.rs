pub mod dose;
pub mod medication;
pub mod reference;

pub use dose::{ester_count, with_prior_cycles, Dose, Schedule};
pub use medication::{Ester, Medication, ProgesteroneRoute, Route};
pub use reference::{ReferenceCurve, ReferencePoint};
