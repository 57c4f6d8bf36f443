//! Optimize a two-injection estradiol schedule with vaginal progesterone
//! against a 28-day curve, then write the resulting concentrations to CSV.
//!
//! Run with `cargo run --example optimize_schedule [out.csv]`.

use std::fs::File;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use hormosol::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};

fn med(name: &str) -> Result<Arc<Medication>> {
    catalog::find(name).ok_or_else(|| anyhow!("{} is not in the catalog", name))
}

fn main() -> Result<()> {
    setup_log("info")?;

    let e2: Vec<f64> = (0..28)
        .map(|d| match d {
            10..=14 => 260.0,
            15..=24 => 170.0,
            _ => 120.0,
        })
        .collect();
    let p4: Vec<f64> = (0..28)
        .map(|d| if (15..=24).contains(&d) { 8.0 } else { 0.5 })
        .collect();
    let reference = ReferenceCurve::from_values(&e2, Some(&p4))?;

    let params = OptimizationParams::new(
        vec![
            med(catalog::ESTRADIOL_VALERATE)?,
            med(catalog::ESTRADIOL_ENANTHATE)?,
            med(catalog::PROGESTERONE_VAGINAL)?,
        ],
        reference,
    )
    .with_max_injections(2)
    .with_seed(7)
    .with_beam_width(2);

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")?);
    let result = optimize_with_progress(params, |progress| {
        bar.set_position(progress.percent as u64);
        bar.set_message(format!("score {:.5}", progress.score));
    })?;
    bar.finish();

    println!("MSE {:.5} after {} iterations", result.score, result.iterations);
    for dose in &result.doses {
        println!("day {:>4.1}  {:>7.2} mg  {}", dose.day, dose.amount, dose.medication);
    }

    if let Some(path) = std::env::args().nth(1) {
        let grid = generate_time_grid(result.cycle_length as f64, 0.25);
        let series = result.to_schedule().concentration(&grid);
        write_csv(&series, File::create(&path)?)?;
        println!("Wrote {} points to {}", series.len(), path);
    }
    Ok(())
}
