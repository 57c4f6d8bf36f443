use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::medication::default_concentrations;
use crate::data::{Medication, ReferenceCurve};
use crate::HormosolError;

/// Inputs of one schedule optimization
///
/// Dose bounds (`min_dose`, `max_dose`) are in mg and apply to ester
/// injections. Progesterone amounts come from `progesterone_doses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationParams {
    /// Medications the optimizer may schedule
    pub medications: Vec<Arc<Medication>>,
    /// Target curve, tiled onto `schedule_length`
    pub reference: ReferenceCurve,
    /// Cycle length in days (default: the reference cycle length)
    #[serde(default)]
    pub schedule_length: Option<usize>,
    #[serde(default = "default_steady_state")]
    pub steady_state: bool,
    /// Smallest adjustable ester volume in mL
    #[serde(default = "default_granularity")]
    pub granularity: f64,
    #[serde(default = "default_min_dose")]
    pub min_dose: f64,
    #[serde(default = "default_max_dose")]
    pub max_dose: f64,
    /// Maximum number of ester injections per cycle
    #[serde(default = "default_max_injections")]
    pub max_injections: usize,
    /// Vial concentration (mg/mL) per ester name
    #[serde(default = "default_concentrations")]
    pub concentrations: BTreeMap<String, f64>,
    /// Allowed progesterone amounts in mg
    #[serde(default = "default_progesterone_doses")]
    pub progesterone_doses: Vec<f64>,
    /// Score on accuracy alone, without simplicity penalties
    #[serde(default)]
    pub accuracy_only: bool,
    /// Seed for the random starting candidate; no random candidate when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Number of starting candidates that are searched
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    #[serde(default)]
    pub tuning: SearchTuning,
}

fn default_steady_state() -> bool {
    true
}
fn default_granularity() -> f64 {
    0.05
}
fn default_min_dose() -> f64 {
    1.0
}
fn default_max_dose() -> f64 {
    20.0
}
fn default_max_injections() -> usize {
    4
}
fn default_progesterone_doses() -> Vec<f64> {
    vec![100.0, 200.0]
}
fn default_beam_width() -> usize {
    1
}

/// Convergence and refinement constants of the local search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    /// An iteration counts as an improvement only above this score decrease
    pub min_improvement: f64,
    /// Stalled iterations before the step size is halved
    pub refine_trigger: usize,
    /// Stalled iterations at the finest step size before stopping
    pub convergence_patience: usize,
    /// Starting multiplier applied to `granularity`
    pub initial_granularity_multiplier: f64,
    /// Multiplier floor
    pub min_granularity_multiplier: f64,
    /// Iterations between yields to the driver
    pub yield_interval: usize,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            min_improvement: 1e-6,
            refine_trigger: 2,
            convergence_patience: 3,
            initial_granularity_multiplier: 4.0,
            min_granularity_multiplier: 1.0,
            yield_interval: 5,
        }
    }
}

impl OptimizationParams {
    pub fn new(medications: Vec<Arc<Medication>>, reference: ReferenceCurve) -> Self {
        Self {
            medications,
            reference,
            schedule_length: None,
            steady_state: default_steady_state(),
            granularity: default_granularity(),
            min_dose: default_min_dose(),
            max_dose: default_max_dose(),
            max_injections: default_max_injections(),
            concentrations: default_concentrations(),
            progesterone_doses: default_progesterone_doses(),
            accuracy_only: false,
            seed: None,
            beam_width: default_beam_width(),
            tuning: SearchTuning::default(),
        }
    }

    /// Parse parameters from a JSON document
    pub fn from_json(json: &str) -> Result<Self, HormosolError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_schedule_length(mut self, days: usize) -> Self {
        self.schedule_length = Some(days);
        self
    }

    pub fn with_steady_state(mut self, steady_state: bool) -> Self {
        self.steady_state = steady_state;
        self
    }

    pub fn with_granularity(mut self, ml: f64) -> Self {
        self.granularity = ml;
        self
    }

    pub fn with_dose_bounds(mut self, min_dose: f64, max_dose: f64) -> Self {
        self.min_dose = min_dose;
        self.max_dose = max_dose;
        self
    }

    pub fn with_max_injections(mut self, max_injections: usize) -> Self {
        self.max_injections = max_injections;
        self
    }

    pub fn with_concentration(mut self, name: impl Into<String>, mg_per_ml: f64) -> Self {
        self.concentrations.insert(name.into(), mg_per_ml);
        self
    }

    pub fn with_progesterone_doses(mut self, doses: Vec<f64>) -> Self {
        self.progesterone_doses = doses;
        self
    }

    pub fn with_accuracy_only(mut self, accuracy_only: bool) -> Self {
        self.accuracy_only = accuracy_only;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    pub fn with_tuning(mut self, tuning: SearchTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Effective cycle length in days
    pub fn cycle_length(&self) -> usize {
        self.schedule_length
            .unwrap_or_else(|| self.reference.cycle_length())
    }

    /// Vial concentration for an ester; only valid after [`Self::validate`]
    pub(crate) fn concentration_of(&self, name: &str) -> f64 {
        self.concentrations.get(name).copied().unwrap_or(1.0)
    }

    /// Smallest configured progesterone amount
    pub(crate) fn smallest_progesterone_dose(&self) -> f64 {
        self.progesterone_doses
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Check every setting before a search begins
    pub fn validate(&self) -> Result<(), HormosolError> {
        if self.medications.is_empty() {
            return Err(HormosolError::EmptyMedications);
        }
        for medication in &self.medications {
            medication.validate()?;
            if let Medication::Ester(ester) = medication.as_ref() {
                match self.concentrations.get(&ester.name) {
                    Some(c) if c.is_finite() && *c > 0.0 => {}
                    Some(c) => {
                        return Err(HormosolError::invalid_parameter(
                            &format!("concentrations[{}]", ester.name),
                            c,
                        ))
                    }
                    None => {
                        return Err(HormosolError::MissingConcentration {
                            name: ester.name.clone(),
                        })
                    }
                }
            }
        }

        if self.cycle_length() == 0 {
            return Err(HormosolError::invalid_parameter("schedule_length", 0));
        }
        if !(self.granularity.is_finite() && self.granularity > 0.0) {
            return Err(HormosolError::invalid_parameter(
                "granularity",
                self.granularity,
            ));
        }
        if !(self.min_dose.is_finite() && self.min_dose >= 0.0) {
            return Err(HormosolError::invalid_parameter("min_dose", self.min_dose));
        }
        if !(self.max_dose.is_finite() && self.max_dose > 0.0 && self.max_dose >= self.min_dose) {
            return Err(HormosolError::invalid_parameter("max_dose", self.max_dose));
        }
        if self.beam_width == 0 {
            return Err(HormosolError::invalid_parameter("beam_width", 0));
        }

        let uses_progesterone = self.medications.iter().any(|m| !m.is_ester());
        if uses_progesterone
            && (self.progesterone_doses.is_empty()
                || self
                    .progesterone_doses
                    .iter()
                    .any(|d| !(d.is_finite() && *d > 0.0)))
        {
            return Err(HormosolError::invalid_parameter(
                "progesterone_doses",
                format!("{:?}", self.progesterone_doses),
            ));
        }

        let tuning = &self.tuning;
        if !(tuning.min_improvement.is_finite() && tuning.min_improvement > 0.0) {
            return Err(HormosolError::invalid_parameter(
                "tuning.min_improvement",
                tuning.min_improvement,
            ));
        }
        if !(tuning.min_granularity_multiplier > 0.0
            && tuning.initial_granularity_multiplier >= tuning.min_granularity_multiplier
            && tuning.initial_granularity_multiplier.is_finite())
        {
            return Err(HormosolError::invalid_parameter(
                "tuning.initial_granularity_multiplier",
                tuning.initial_granularity_multiplier,
            ));
        }
        if tuning.yield_interval == 0 {
            return Err(HormosolError::invalid_parameter("tuning.yield_interval", 0));
        }
        if tuning.convergence_patience == 0 {
            return Err(HormosolError::invalid_parameter(
                "tuning.convergence_patience",
                0,
            ));
        }
        if tuning.refine_trigger == 0 {
            return Err(HormosolError::invalid_parameter("tuning.refine_trigger", 0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::medication::{esters, find, Ester, PROGESTERONE_ORAL};

    fn reference() -> ReferenceCurve {
        ReferenceCurve::constant(7, 150.0, None).unwrap()
    }

    #[test]
    fn defaults_validate() {
        let params = OptimizationParams::new(esters(), reference());
        assert!(params.validate().is_ok());
        assert_eq!(params.cycle_length(), 7);
    }

    #[test]
    fn empty_medications_fail_fast() {
        let params = OptimizationParams::new(vec![], reference());
        assert!(matches!(
            params.validate(),
            Err(HormosolError::EmptyMedications)
        ));
    }

    #[test]
    fn custom_ester_needs_a_concentration() {
        let custom: Arc<Medication> = Arc::new(Ester::new("custom", 100.0, 1.0, 0.2, 0.5).into());
        let params = OptimizationParams::new(vec![custom.clone()], reference());
        assert!(matches!(
            params.validate(),
            Err(HormosolError::MissingConcentration { .. })
        ));
        let params = OptimizationParams::new(vec![custom], reference())
            .with_concentration("custom", 20.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn progesterone_needs_doses() {
        let params = OptimizationParams::new(vec![find(PROGESTERONE_ORAL).unwrap()], reference())
            .with_progesterone_doses(vec![]);
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let params = OptimizationParams::new(esters(), reference()).with_dose_bounds(10.0, 5.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_tuning_counters_name_their_parameter() {
        let tuning = SearchTuning {
            refine_trigger: 0,
            ..SearchTuning::default()
        };
        let params = OptimizationParams::new(vec![find(PROGESTERONE_ORAL).unwrap()], reference())
            .with_tuning(tuning);
        match params.validate() {
            Err(HormosolError::InvalidParameter { param, .. }) => {
                assert_eq!(param, "tuning.refine_trigger")
            }
            other => panic!("unexpected {:?}", other),
        }

        let tuning = SearchTuning {
            convergence_patience: 0,
            ..SearchTuning::default()
        };
        let params = OptimizationParams::new(vec![find(PROGESTERONE_ORAL).unwrap()], reference())
            .with_tuning(tuning);
        match params.validate() {
            Err(HormosolError::InvalidParameter { param, .. }) => {
                assert_eq!(param, "tuning.convergence_patience")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn json_fills_in_defaults() {
        let medication = serde_json::to_value(&*find(PROGESTERONE_ORAL).unwrap()).unwrap();
        let json = serde_json::json!({
            "medications": [medication],
            "reference": [
                {"day": 0, "estradiol": 100.0, "progesterone": 5.0},
                {"day": 1, "estradiol": 120.0, "progesterone": 8.0}
            ],
            "max_injections": 2
        })
        .to_string();
        let params = OptimizationParams::from_json(&json).unwrap();
        assert_eq!(params.max_injections, 2);
        assert_eq!(params.progesterone_doses, vec![100.0, 200.0]);
        assert_eq!(params.tuning.yield_interval, 5);
        assert!(params.validate().is_ok());
    }
}
