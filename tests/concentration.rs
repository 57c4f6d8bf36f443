use approx::assert_relative_eq;
use hormosol::prelude::*;
use hormosol::simulator::{ester_concentration, progesterone_concentration, EFFECT_DURATION_DAYS};

fn valerate() -> Ester {
    Ester::new("EV", 2596.06, 2.382, 0.233, 1.376)
}

fn catalog_esters() -> Vec<Ester> {
    catalog::catalog()
        .iter()
        .filter_map(|m| match m.as_ref() {
            Medication::Ester(e) => Some(e.clone()),
            Medication::Progesterone(_) => None,
        })
        .collect()
}

#[test]
fn ester_is_zero_outside_its_window() {
    for ester in catalog_esters() {
        assert_eq!(ester_concentration(4.99, 5.0, 4.0, &ester), 0.0);
        assert_eq!(
            ester_concentration(5.0 + EFFECT_DURATION_DAYS + 0.01, 5.0, 4.0, &ester),
            0.0
        );
    }
}

#[test]
fn concentrations_are_finite_and_non_negative() {
    let grid = generate_time_grid(120.0, 0.25);
    for medication in catalog::catalog() {
        let dose = Dose::new(3.0, 10.0, medication.clone());
        for &t in &grid {
            let (e2, p4) = dose_concentration(t, &dose);
            assert!(e2.is_finite() && e2 >= 0.0, "{} at {}", medication, t);
            assert!(p4.is_finite() && p4 >= 0.0, "{} at {}", medication, t);
        }
    }
}

#[test]
fn ester_is_linear_in_amount() {
    let ester = valerate();
    for t in [0.5, 1.0, 3.0, 10.0, 40.0] {
        assert_relative_eq!(
            ester_concentration(t, 0.0, 8.0, &ester),
            2.0 * ester_concentration(t, 0.0, 4.0, &ester),
            max_relative = 1e-12
        );
    }
}

#[test]
fn ester_is_time_shift_invariant() {
    let ester = valerate();
    for (t, day) in [(7.5, 5.0), (30.0, 12.0), (3.0, 1.0)] {
        assert_relative_eq!(
            ester_concentration(t, day, 5.0, &ester),
            ester_concentration(t - day, 0.0, 5.0, &ester),
            max_relative = 1e-9
        );
    }
}

#[test]
fn total_is_the_sum_of_single_doses() {
    let ev = catalog::find(catalog::ESTRADIOL_VALERATE).unwrap();
    let vaginal = catalog::find(catalog::PROGESTERONE_VAGINAL).unwrap();
    let doses = vec![
        Dose::new(0.0, 4.0, ev.clone()),
        Dose::new(3.5, 6.0, ev),
        Dose::new(2.0, 200.0, vaginal),
    ];
    let grid = generate_time_grid(14.0, 0.5);
    let total = total_concentration(&doses, &grid);

    let singles: Vec<Vec<ConcentrationPoint>> = doses
        .iter()
        .map(|d| total_concentration(std::slice::from_ref(d), &grid))
        .collect();
    for (i, point) in total.iter().enumerate() {
        let e2: f64 = singles.iter().map(|s| s[i].estradiol).sum();
        let p4: f64 = singles.iter().map(|s| s[i].progesterone).sum();
        assert_relative_eq!(point.estradiol, e2, max_relative = 1e-12);
        assert_relative_eq!(point.progesterone, p4, max_relative = 1e-12);
    }
}

#[test]
fn valerate_rises_then_washes_out() {
    let ester = valerate();
    let grid = generate_time_grid(100.0, 0.05);
    let peak = grid
        .iter()
        .map(|&t| ester_concentration(t, 0.0, 6.0, &ester))
        .fold(0.0, f64::max);

    assert!(ester_concentration(2.0, 0.0, 6.0, &ester) > ester_concentration(0.0, 0.0, 6.0, &ester));
    assert!(ester_concentration(100.0, 0.0, 6.0, &ester) < 0.01 * peak);
}

#[test]
fn progesterone_needs_no_estradiol_channel() {
    let oral = catalog::find(catalog::PROGESTERONE_ORAL).unwrap();
    let Medication::Progesterone(route) = oral.as_ref() else {
        panic!("oral progesterone should be a progesterone route");
    };
    let dose = Dose::new(1.0, 100.0, oral.clone());
    let (e2, p4) = dose_concentration(1.25, &dose);
    assert_eq!(e2, 0.0);
    assert_relative_eq!(p4, progesterone_concentration(1.25, 1.0, 100.0, route));
}

#[test]
fn steady_state_schedule_includes_prior_cycles() {
    let ev = catalog::find(catalog::ESTRADIOL_VALERATE).unwrap();
    let doses = vec![Dose::new(0.0, 4.0, ev)];
    let grid = generate_time_grid(7.0, 0.5);

    let cold = Schedule::new(doses.clone(), 7, false).concentration(&grid);
    let warm = Schedule::new(doses, 7, true).concentration(&grid);
    assert!(cold[0].estradiol.abs() < 1e-9);
    assert!(warm[0].estradiol > 0.0);
    for (c, w) in cold.iter().zip(&warm) {
        assert!(w.estradiol >= c.estradiol);
    }
}

#[test]
fn series_exports_to_csv() {
    let ev = catalog::find(catalog::ESTRADIOL_VALERATE).unwrap();
    let series = total_concentration(&[Dose::new(0.0, 4.0, ev)], &generate_time_grid(2.0, 0.5));
    let mut buffer = Vec::new();
    write_csv(&series, &mut buffer).unwrap();

    let text = String::from_utf8(buffer).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,estradiol,progesterone"));
    assert_eq!(lines.count(), series.len());
}
