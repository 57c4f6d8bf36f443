use std::sync::Arc;

use hormosol::optimize::{normalized_mse, PROGESTERONE_REPEATS_PER_DAY};
use hormosol::prelude::*;

fn med(name: &str) -> Arc<Medication> {
    catalog::find(name).unwrap()
}

fn maintenance(days: usize) -> ReferenceCurve {
    ReferenceCurve::constant(days, 180.0, None).unwrap()
}

/// Fortnightly curve with a mid-cycle estradiol bump
fn bumped(days: usize) -> ReferenceCurve {
    let e2: Vec<f64> = (0..days)
        .map(|d| if (5..9).contains(&d) { 240.0 } else { 150.0 })
        .collect();
    ReferenceCurve::from_values(&e2, None).unwrap()
}

fn assert_no_duplicate_slots(result: &OptimizationResult) {
    for (i, a) in result.doses.iter().enumerate() {
        for b in &result.doses[i + 1..] {
            assert!(
                a.day != b.day || a.medication.name() != b.medication.name(),
                "{} given twice on day {}",
                a.medication,
                a.day
            );
        }
    }
}

#[test]
fn injection_cap_is_respected() {
    for cap in [1, 2, 3] {
        let params = OptimizationParams::new(
            vec![
                med(catalog::ESTRADIOL_VALERATE),
                med(catalog::ESTRADIOL_ENANTHATE),
            ],
            bumped(14),
        )
        .with_max_injections(cap);
        let result = optimize(params).unwrap();
        assert!(result.injection_count() <= cap, "cap {}: {:?}", cap, result.doses);
        assert_no_duplicate_slots(&result);
    }
}

#[test]
fn single_injection_cap_gives_exactly_one_injection() {
    for days in [7, 10] {
        let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], maintenance(days))
            .with_max_injections(1);
        let result = optimize(params).unwrap();
        assert_eq!(result.injection_count(), 1);
    }
}

#[test]
fn coarse_granularity_still_gives_one_injection() {
    let params = OptimizationParams::new(
        vec![med(catalog::ESTRADIOL_CYPIONATE)],
        ReferenceCurve::constant(7, 20.0, None).unwrap(),
    )
    .with_max_injections(1)
    .with_granularity(0.5);
    let result = optimize(params.clone()).unwrap();
    assert_eq!(result.injection_count(), 1);

    let per_step = params.granularity * params.concentrations[catalog::ESTRADIOL_CYPIONATE];
    let steps = result.doses[0].amount / per_step;
    assert!((steps - steps.round()).abs() < 1e-9, "{:?}", result.doses);
    assert!(result.score < 1.0);
}

#[test]
fn single_medication_is_the_only_one_used() {
    let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_ENANTHATE)], bumped(14))
        .with_max_injections(2);
    let result = optimize(params).unwrap();
    assert!(!result.doses.is_empty());
    for dose in &result.doses {
        assert_eq!(dose.medication.name(), catalog::ESTRADIOL_ENANTHATE);
    }
}

#[test]
fn ester_amounts_stay_within_bounds() {
    let params = OptimizationParams::new(
        vec![
            med(catalog::ESTRADIOL_VALERATE),
            med(catalog::ESTRADIOL_CYPIONATE),
        ],
        bumped(14),
    )
    .with_dose_bounds(2.0, 6.0)
    .with_max_injections(3);
    let result = optimize(params.clone()).unwrap();
    for dose in &result.doses {
        assert!(dose.amount >= params.min_dose && dose.amount <= params.max_dose, "{:?}", dose);
    }
}

#[test]
fn runs_are_deterministic_without_random_start() {
    let params = || {
        OptimizationParams::new(
            vec![
                med(catalog::ESTRADIOL_VALERATE),
                med(catalog::ESTRADIOL_ENANTHATE),
            ],
            bumped(14),
        )
        .with_max_injections(2)
    };
    assert_eq!(optimize(params()).unwrap(), optimize(params()).unwrap());
}

#[test]
fn seeded_random_start_is_reproducible() {
    let params = || {
        OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], maintenance(7))
            .with_max_injections(2)
            .with_seed(42)
            .with_beam_width(4)
    };
    assert_eq!(optimize(params()).unwrap(), optimize(params()).unwrap());
}

#[test]
fn reported_score_is_the_plain_mse() {
    let reference = bumped(14);
    let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], reference.clone())
        .with_max_injections(2);
    let result = optimize(params).unwrap();
    let expected = normalized_mse(&result.doses, &reference, 14, true);
    assert_eq!(result.score, expected);
    assert!(result.score < 1.0);
}

#[test]
fn schedule_length_can_differ_from_reference() {
    let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], maintenance(7))
        .with_schedule_length(10)
        .with_max_injections(2);
    let result = optimize(params).unwrap();
    assert_eq!(result.cycle_length, 10);
    assert!(result.doses.iter().all(|d| d.day >= 0.0 && d.day < 10.0));
    assert_eq!(result.to_schedule().cycle_length, 10);
}

#[test]
fn progesterone_is_scheduled_against_progesterone_targets() {
    let reference = ReferenceCurve::constant(7, 150.0, Some(6.0)).unwrap();
    let params = OptimizationParams::new(
        vec![
            med(catalog::ESTRADIOL_VALERATE),
            med(catalog::PROGESTERONE_VAGINAL),
        ],
        reference,
    )
    .with_max_injections(2);
    let result = optimize(params.clone()).unwrap();
    assert!(result.doses.iter().any(|d| !d.is_ester()));
    for dose in result.doses.iter().filter(|d| !d.is_ester()) {
        let unit = params.progesterone_doses[0];
        let multiple = dose.amount / unit;
        assert!(multiple.fract() == 0.0 && multiple >= 1.0, "{:?}", dose);
        assert!(multiple <= PROGESTERONE_REPEATS_PER_DAY as f64 * 2.0);
    }
    assert_no_duplicate_slots(&result);
}

#[test]
fn progress_is_monotone_and_ends_at_100() {
    let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], bumped(14))
        .with_max_injections(2);
    let mut seen = Vec::new();
    optimize_with_progress(params, |p| seen.push(*p)).unwrap();

    assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert!(seen[..seen.len() - 1].iter().all(|p| p.percent < 100.0));
    assert_eq!(seen.last().map(|p| p.percent), Some(100.0));
}

#[test]
fn stopping_after_a_yield_is_cancellation() {
    let params = OptimizationParams::new(
        vec![
            med(catalog::ESTRADIOL_VALERATE),
            med(catalog::ESTRADIOL_ENANTHATE),
        ],
        bumped(14),
    )
    .with_max_injections(3);
    let mut optimizer = ScheduleOptimizer::new(params).unwrap();
    if let Step::Yielded(progress) = optimizer.resume() {
        assert_eq!(progress.iteration, 5);
    }
    drop(optimizer);
}

#[test]
fn empty_medication_set_fails_fast() {
    let params = OptimizationParams::new(Vec::new(), maintenance(7));
    assert!(matches!(
        ScheduleOptimizer::new(params),
        Err(HormosolError::EmptyMedications)
    ));
}

#[test]
fn unknown_ester_needs_a_concentration() {
    let custom = Arc::new(Medication::from(Ester::new(
        "Estradiol benzoate",
        500.0,
        3.0,
        0.5,
        1.2,
    )));
    let params = OptimizationParams::new(vec![custom.clone()], maintenance(7));
    assert!(matches!(
        optimize(params),
        Err(HormosolError::MissingConcentration { .. })
    ));

    let params = OptimizationParams::new(vec![custom], maintenance(7))
        .with_concentration("Estradiol benzoate", 10.0)
        .with_max_injections(1);
    assert_eq!(optimize(params).unwrap().injection_count(), 1);
}

#[test]
fn best_injection_count_is_within_range() {
    let params = OptimizationParams::new(vec![med(catalog::ESTRADIOL_VALERATE)], bumped(14));
    let best = find_best_injection_count(&params, 3).unwrap();
    assert!((1..=3).contains(&best.injections));
    assert!(best.result.injection_count() <= best.injections);

    let single = optimize(params.with_max_injections(1).with_accuracy_only(true)).unwrap();
    assert!(best.result.score <= single.score);
}

#[test]
fn params_load_from_json() {
    let json = r#"{
        "medications": [
            { "kind": "ester", "name": "Estradiol valerate",
              "d": 2596.05956, "k1": 2.38229125, "k2": 0.23345814, "k3": 1.37642769 }
        ],
        "reference": [
            { "day": 0, "estradiol": 180.0 },
            { "day": 1, "estradiol": 180.0 },
            { "day": 2, "estradiol": 180.0 },
            { "day": 3, "estradiol": 180.0 },
            { "day": 4, "estradiol": 180.0 },
            { "day": 5, "estradiol": 180.0 },
            { "day": 6, "estradiol": 180.0 }
        ],
        "max_injections": 1,
        "tuning": { "yield_interval": 2 }
    }"#;
    let params = OptimizationParams::from_json(json).unwrap();
    assert_eq!(params.cycle_length(), 7);
    assert_eq!(params.tuning.yield_interval, 2);
    assert_eq!(params.tuning.convergence_patience, 3);
    assert_eq!(optimize(params).unwrap().injection_count(), 1);
}

#[test]
fn reference_with_gaps_is_rejected_from_json() {
    let json = r#"{
        "medications": [],
        "reference": [ { "day": 0, "estradiol": 180.0 }, { "day": 2, "estradiol": 180.0 } ]
    }"#;
    assert!(matches!(
        OptimizationParams::from_json(json),
        Err(HormosolError::Json(_))
    ));
}
