use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::HormosolError;

/// A dosable formulation together with its kinetic constants
///
/// Medications are immutable reference data. Doses hold them behind an [`Arc`]
/// so schedules can be cloned freely during the search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Medication {
    /// An injectable estradiol ester
    Ester(Ester),
    /// Progesterone given by a non-injected route
    Progesterone(ProgesteroneRoute),
}

/// Estradiol ester described by a three-exponential depot model
///
/// The concentration produced by one dose is proportional to the second
/// divided difference of `exp(-k·Δt)` over the three rate constants, scaled
/// by `d` (see [`crate::simulator::ester_concentration`]).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ester {
    pub name: String,
    /// Scale constant of the depot model
    pub d: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl Ester {
    pub fn new(name: impl Into<String>, d: f64, k1: f64, k2: f64, k3: f64) -> Self {
        Self {
            name: name.into(),
            d,
            k1,
            k2,
            k3,
        }
    }

    /// Half-life in days derived from the `k2` constant (ln 2 / k2)
    pub fn half_life(&self) -> f64 {
        std::f64::consts::LN_2 / self.k2
    }
}

/// Route of administration for progesterone
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Oral,
    Vaginal,
    Rectal,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Oral => write!(f, "oral"),
            Route::Vaginal => write!(f, "vaginal"),
            Route::Rectal => write!(f, "rectal"),
        }
    }
}

/// One-compartment model with first-order absorption
///
/// Rate constants are per hour. `vd` is scaled so that an amount in mg
/// yields a concentration in ng/mL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgesteroneRoute {
    pub name: String,
    pub route: Route,
    /// Bioavailable fraction
    pub f: f64,
    pub ka: f64,
    pub ke: f64,
    pub vd: f64,
}

impl ProgesteroneRoute {
    pub fn new(name: impl Into<String>, route: Route, f: f64, ka: f64, ke: f64, vd: f64) -> Self {
        Self {
            name: name.into(),
            route,
            f,
            ka,
            ke,
            vd,
        }
    }
}

impl Medication {
    pub fn name(&self) -> &str {
        match self {
            Medication::Ester(ester) => &ester.name,
            Medication::Progesterone(route) => &route.name,
        }
    }

    pub fn is_ester(&self) -> bool {
        matches!(self, Medication::Ester(_))
    }

    /// Check that all kinetic constants are strictly positive and finite
    ///
    /// Coincident rate constants are accepted; the concentration models fall
    /// back to their limiting forms in that case.
    pub fn validate(&self) -> Result<(), HormosolError> {
        let constants: Vec<(&str, f64)> = match self {
            Medication::Ester(e) => vec![("D", e.d), ("k1", e.k1), ("k2", e.k2), ("k3", e.k3)],
            Medication::Progesterone(p) => {
                if p.f > 1.0 {
                    return Err(HormosolError::InvalidMedication {
                        name: p.name.clone(),
                        reason: format!("bioavailability {} exceeds 1", p.f),
                    });
                }
                vec![("F", p.f), ("ka", p.ka), ("ke", p.ke), ("Vd", p.vd)]
            }
        };

        for (label, value) in constants {
            if !(value.is_finite() && value > 0.0) {
                return Err(HormosolError::InvalidMedication {
                    name: self.name().to_string(),
                    reason: format!("{} must be positive and finite, got {}", label, value),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Medication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<Ester> for Medication {
    fn from(ester: Ester) -> Self {
        Medication::Ester(ester)
    }
}

impl From<ProgesteroneRoute> for Medication {
    fn from(route: ProgesteroneRoute) -> Self {
        Medication::Progesterone(route)
    }
}

pub const ESTRADIOL_VALERATE: &str = "Estradiol valerate";
pub const ESTRADIOL_ENANTHATE: &str = "Estradiol enanthate";
pub const ESTRADIOL_CYPIONATE: &str = "Estradiol cypionate";
pub const ESTRADIOL_UNDECYLATE: &str = "Estradiol undecylate";
pub const PROGESTERONE_ORAL: &str = "Progesterone (oral)";
pub const PROGESTERONE_VAGINAL: &str = "Progesterone (vaginal)";
pub const PROGESTERONE_RECTAL: &str = "Progesterone (rectal)";

lazy_static! {
    static ref CATALOG: Vec<Arc<Medication>> = vec![
        Arc::new(Ester::new(ESTRADIOL_VALERATE, 2596.05956, 2.38229125, 0.23345814, 1.37642769).into()),
        Arc::new(Ester::new(ESTRADIOL_ENANTHATE, 333.874181, 0.42412968, 0.43452980, 0.15291485).into()),
        Arc::new(Ester::new(ESTRADIOL_CYPIONATE, 1920.89671, 0.10321089, 0.89854779, 0.89359759).into()),
        Arc::new(Ester::new(ESTRADIOL_UNDECYLATE, 65.9493374, 0.00186359, 0.05270991, 0.02068071).into()),
        Arc::new(ProgesteroneRoute::new(PROGESTERONE_ORAL, Route::Oral, 0.10, 1.5, 0.35, 0.65).into()),
        Arc::new(ProgesteroneRoute::new(PROGESTERONE_VAGINAL, Route::Vaginal, 0.25, 0.35, 0.10, 4.0).into()),
        Arc::new(ProgesteroneRoute::new(PROGESTERONE_RECTAL, Route::Rectal, 0.30, 0.50, 0.12, 3.0).into()),
    ];
    static ref VIAL_CONCENTRATIONS: BTreeMap<String, f64> = [
        (ESTRADIOL_VALERATE, 40.0),
        (ESTRADIOL_ENANTHATE, 40.0),
        (ESTRADIOL_CYPIONATE, 5.0),
        (ESTRADIOL_UNDECYLATE, 100.0),
    ]
    .into_iter()
    .map(|(name, mg_per_ml)| (name.to_string(), mg_per_ml))
    .collect();
}

/// All built-in medications
pub fn catalog() -> &'static [Arc<Medication>] {
    &CATALOG
}

/// Look up a built-in medication by its exact name
pub fn find(name: &str) -> Option<Arc<Medication>> {
    CATALOG.iter().find(|m| m.name() == name).cloned()
}

/// Built-in esters only
pub fn esters() -> Vec<Arc<Medication>> {
    CATALOG.iter().filter(|m| m.is_ester()).cloned().collect()
}

/// Common vial concentrations (mg/mL) for the built-in esters
pub fn default_concentrations() -> BTreeMap<String, f64> {
    VIAL_CONCENTRATIONS.clone()
}
