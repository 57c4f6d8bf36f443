//! Closed-form concentration models
//!
//! Every dose contributes independently, so a schedule's curve is the
//! pointwise sum of single-dose curves. Estradiol and progesterone never
//! interact: ester doses only feed the estradiol channel and progesterone
//! doses only feed the progesterone channel.
//!
//! ```rust
//! use hormosol::prelude::*;
//!
//! let ev = catalog::find(catalog::ESTRADIOL_VALERATE).unwrap();
//! let doses = vec![Dose::new(0.0, 4.0, ev.clone()), Dose::new(7.0, 4.0, ev)];
//! let curve = total_concentration(&doses, &generate_time_grid(14.0, 0.5));
//! ```

mod ester;
mod progesterone;

use std::io::Write;

use serde::{Deserialize, Serialize};

pub use ester::{ester_concentration, EFFECT_DURATION_DAYS};
pub use progesterone::progesterone_concentration;

use crate::data::{Dose, Medication};
use crate::HormosolError;

/// Simulated concentrations at one instant
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationPoint {
    /// Time in days
    pub time: f64,
    /// Estradiol (pg/mL)
    pub estradiol: f64,
    /// Progesterone (ng/mL)
    pub progesterone: f64,
}

/// Concentration contributed by `dose` at time `t`, as `(estradiol, progesterone)`
pub fn dose_concentration(t: f64, dose: &Dose) -> (f64, f64) {
    match dose.medication.as_ref() {
        Medication::Ester(ester) => (ester_concentration(t, dose.day, dose.amount, ester), 0.0),
        Medication::Progesterone(route) => (
            0.0,
            progesterone_concentration(t, dose.day, dose.amount, route),
        ),
    }
}

/// Sum the contributions of all `doses` at every time in `times`
pub fn total_concentration(doses: &[Dose], times: &[f64]) -> Vec<ConcentrationPoint> {
    times
        .iter()
        .map(|&time| {
            let (estradiol, progesterone) = doses
                .iter()
                .map(|dose| dose_concentration(time, dose))
                .fold((0.0, 0.0), |(e2, p4), (de2, dp4)| (e2 + de2, p4 + dp4));
            ConcentrationPoint {
                time,
                estradiol,
                progesterone,
            }
        })
        .collect()
}

/// `0, step, 2·step, …` up to and including `max_days`
///
/// Returns an empty grid when `step` is not positive or either bound is not finite.
pub fn generate_time_grid(max_days: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0 && step.is_finite() && max_days.is_finite()) || max_days < 0.0 {
        return Vec::new();
    }
    // Tolerate accumulated error so that `max_days` itself is kept
    let n = (max_days / step + 1e-9).floor() as usize;
    (0..=n).map(|i| i as f64 * step).collect()
}

/// Linearly interpolate a series sampled on a uniform grid starting at 0
pub(crate) fn interpolate(
    series: &[ConcentrationPoint],
    step: f64,
    t: f64,
) -> ConcentrationPoint {
    let last = series.len().saturating_sub(1);
    let position = (t / step).max(0.0);
    let lo = (position.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = if hi == lo { 0.0 } else { position - lo as f64 };
    let (a, b) = (series[lo], series[hi]);
    ConcentrationPoint {
        time: t,
        estradiol: a.estradiol + (b.estradiol - a.estradiol) * frac,
        progesterone: a.progesterone + (b.progesterone - a.progesterone) * frac,
    }
}

/// Write a concentration series as CSV with a `time,estradiol,progesterone` header
pub fn write_csv<W: Write>(series: &[ConcentrationPoint], writer: W) -> Result<(), HormosolError> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for point in series {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}
