use crate::data::ProgesteroneRoute;

/// `|ka - ke|` below this uses the equal-rates limiting form
const EQUAL_RATES_EPSILON: f64 = 1e-9;

/// Analytical solution for a one compartment model with first-order absorption.
///
/// # Assumptions
/// - `t` and `dose_day` are in days, rate constants are per hour
/// - `amount` is in mg and the result is in ng/mL
/// - returns 0 before the dose
pub fn progesterone_concentration(
    t: f64,
    dose_day: f64,
    amount: f64,
    route: &ProgesteroneRoute,
) -> f64 {
    if t < dose_day {
        return 0.0;
    }
    let hours = (t - dose_day) * 24.0;
    let (f, ka, ke, vd) = (route.f, route.ka, route.ke, route.vd);

    let concentration = if (ka - ke).abs() < EQUAL_RATES_EPSILON {
        f * amount * ka * hours / vd * (-ke * hours).exp()
    } else {
        f * amount * ka / (vd * (ka - ke)) * ((-ke * hours).exp() - (-ka * hours).exp())
    };
    concentration.max(0.0)
}
