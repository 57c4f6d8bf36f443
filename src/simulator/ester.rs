use crate::data::Ester;

/// Contributions later than this many days after a dose are truncated to zero
pub const EFFECT_DURATION_DAYS: f64 = 100.0;

/// Rate constants closer than this (relative) use the confluent limiting form
const RATE_TOLERANCE: f64 = 1e-6;

/// Analytical solution for a three-exponential ester depot model.
///
/// # Assumptions
/// - `t` and `dose_day` are in days
/// - `amount` is in mg
/// - returns 0 before the dose and beyond [`EFFECT_DURATION_DAYS`]
///
/// With `Δt = t - dose_day` the concentration is
///
/// ```text
/// (amount · D / 5) · k1 · k2 · ( e^{-k1Δt} / ((k1-k2)(k1-k3))
///                              + e^{-k3Δt} / ((k1-k3)(k2-k3))
///                              + e^{-k2Δt}(k3-k1) / ((k1-k2)(k1-k3)(k2-k3)) )
/// ```
///
/// The bracket is the second divided difference of `k ↦ e^{-kΔt}` over
/// `(k1, k2, k3)`. When two constants coincide it is evaluated through the
/// derivative limit instead of dividing by zero.
pub fn ester_concentration(t: f64, dose_day: f64, amount: f64, ester: &Ester) -> f64 {
    if t < dose_day || t > dose_day + EFFECT_DURATION_DAYS {
        return 0.0;
    }
    let dt = t - dose_day;
    let (k1, k2, k3) = (ester.k1, ester.k2, ester.k3);

    let modes = if distinct(k1, k2) && distinct(k1, k3) && distinct(k2, k3) {
        let term1 = (-dt * k1).exp() / ((k1 - k2) * (k1 - k3));
        let term2 = (-dt * k3).exp() / ((k1 - k3) * (k2 - k3));
        let term3 = (-dt * k2).exp() * (k3 - k1) / ((k1 - k2) * (k1 - k3) * (k2 - k3));
        term1 + term2 + term3
    } else {
        confluent_divided_difference(dt, k1, k2, k3)
    };

    let concentration = (amount * ester.d / 5.0) * k1 * k2 * modes;
    concentration.max(0.0)
}

fn distinct(a: f64, b: f64) -> bool {
    (a - b).abs() > RATE_TOLERANCE * a.abs().max(b.abs())
}

/// Second divided difference of `k ↦ e^{-k·dt}` that tolerates repeated nodes
fn confluent_divided_difference(dt: f64, a: f64, b: f64, c: f64) -> f64 {
    let mut k = [a, b, c];
    k.sort_by(|x, y| x.total_cmp(y));
    let [lo, mid, hi] = k;

    if !distinct(lo, hi) {
        let centre = (lo + mid + hi) / 3.0;
        return 0.5 * dt * dt * (-centre * dt).exp();
    }
    (first_difference(dt, mid, hi) - first_difference(dt, lo, mid)) / (hi - lo)
}

fn first_difference(dt: f64, a: f64, b: f64) -> f64 {
    if distinct(a, b) {
        ((-a * dt).exp() - (-b * dt).exp()) / (a - b)
    } else {
        -dt * (-0.5 * (a + b) * dt).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valerate() -> Ester {
        Ester::new("EV", 2596.05956, 2.38229125, 0.23345814, 1.37642769)
    }

    #[test]
    fn zero_outside_the_effect_window() {
        let ester = valerate();
        assert_eq!(ester_concentration(4.9, 5.0, 6.0, &ester), 0.0);
        assert_eq!(
            ester_concentration(5.0 + EFFECT_DURATION_DAYS + 0.01, 5.0, 6.0, &ester),
            0.0
        );
    }

    #[test]
    fn rises_then_decays() {
        let ester = valerate();
        let start = ester_concentration(0.0, 0.0, 6.0, &ester);
        let early = ester_concentration(2.0, 0.0, 6.0, &ester);
        let late = ester_concentration(30.0, 0.0, 6.0, &ester);
        assert!(early > start);
        assert!(late < early);
    }

    #[test]
    fn limiting_form_matches_nearby_distinct_constants() {
        let coincident = Ester::new("flat", 500.0, 0.5, 0.2, 0.2);
        let nearby = Ester::new("near", 500.0, 0.5, 0.2, 0.2 + 1e-5);
        for t in [0.5, 1.0, 3.0, 10.0, 40.0] {
            let exact = ester_concentration(t, 0.0, 4.0, &coincident);
            let near = ester_concentration(t, 0.0, 4.0, &nearby);
            assert!(exact.is_finite());
            assert_relative_eq!(exact, near, max_relative = 1e-3);
        }
    }

    #[test]
    fn triple_coincidence_is_finite_and_positive() {
        let ester = Ester::new("triple", 100.0, 0.3, 0.3, 0.3);
        let value = ester_concentration(2.0, 0.0, 1.0, &ester);
        assert!(value.is_finite());
        assert!(value > 0.0);
        // (D/5)·k1·k2·(dt²/2)·e^{-k·dt}
        assert_relative_eq!(
            value,
            20.0 * 0.09 * 2.0 * (-0.6f64).exp(),
            max_relative = 1e-12
        );
    }
}
