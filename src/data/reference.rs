use serde::{Deserialize, Serialize};

use crate::HormosolError;

/// Target concentrations for one whole day of the reference cycle
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ReferencePoint {
    pub day: usize,
    /// Estradiol target (pg/mL)
    pub estradiol: f64,
    /// Progesterone target (ng/mL), when this profile tracks progesterone
    pub progesterone: Option<f64>,
}

/// Desired per-day concentration curve
///
/// Days are contiguous from 0. The curve can be tiled onto any schedule
/// length with [`ReferenceCurve::tile`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Vec<ReferencePoint>", into = "Vec<ReferencePoint>")]
pub struct ReferenceCurve {
    points: Vec<ReferencePoint>,
}

impl ReferenceCurve {
    pub fn new(points: Vec<ReferencePoint>) -> Result<Self, HormosolError> {
        if points.is_empty() {
            return Err(HormosolError::InvalidReference {
                reason: "curve has no points".to_string(),
            });
        }
        for (expected, point) in points.iter().enumerate() {
            if point.day != expected {
                return Err(HormosolError::InvalidReference {
                    reason: format!("expected day {} but found day {}", expected, point.day),
                });
            }
            let targets = std::iter::once(point.estradiol).chain(point.progesterone);
            for target in targets {
                if !(target.is_finite() && target >= 0.0) {
                    return Err(HormosolError::InvalidReference {
                        reason: format!("day {} has invalid target {}", point.day, target),
                    });
                }
            }
        }
        Ok(Self { points })
    }

    /// Build a curve from per-day estradiol targets, with optional progesterone targets
    pub fn from_values(
        estradiol: &[f64],
        progesterone: Option<&[f64]>,
    ) -> Result<Self, HormosolError> {
        if let Some(p4) = progesterone {
            if p4.len() != estradiol.len() {
                return Err(HormosolError::InvalidReference {
                    reason: format!(
                        "{} estradiol targets but {} progesterone targets",
                        estradiol.len(),
                        p4.len()
                    ),
                });
            }
        }
        let points = estradiol
            .iter()
            .enumerate()
            .map(|(day, &e2)| ReferencePoint {
                day,
                estradiol: e2,
                progesterone: progesterone.map(|p4| p4[day]),
            })
            .collect();
        Self::new(points)
    }

    /// Flat targets for a non-cycling regimen
    pub fn constant(
        days: usize,
        estradiol: f64,
        progesterone: Option<f64>,
    ) -> Result<Self, HormosolError> {
        let points = (0..days)
            .map(|day| ReferencePoint {
                day,
                estradiol,
                progesterone,
            })
            .collect();
        Self::new(points)
    }

    /// Number of days in one reference cycle
    pub fn cycle_length(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    /// Targets for `day`, wrapping around the reference cycle
    pub fn at(&self, day: usize) -> &ReferencePoint {
        &self.points[day % self.points.len()]
    }

    /// Repeat (or truncate) the cycle so it covers exactly `length` days
    pub fn tile(&self, length: usize) -> ReferenceCurve {
        let points = (0..length)
            .map(|day| ReferencePoint {
                day,
                ..*self.at(day)
            })
            .collect();
        ReferenceCurve { points }
    }

    pub fn has_progesterone(&self) -> bool {
        self.points.iter().any(|p| p.progesterone.is_some())
    }

    pub fn median_estradiol(&self) -> f64 {
        median(self.points.iter().map(|p| p.estradiol).collect())
    }

    pub fn median_progesterone(&self) -> Option<f64> {
        let values: Vec<f64> = self.points.iter().filter_map(|p| p.progesterone).collect();
        if values.is_empty() {
            None
        } else {
            Some(median(values))
        }
    }

    /// Days ordered by `estradiol + progesterone_weight · progesterone`, highest first
    pub fn days_by_importance(&self, progesterone_weight: f64) -> Vec<usize> {
        let mut days: Vec<(usize, f64)> = self
            .points
            .iter()
            .map(|p| {
                (
                    p.day,
                    p.estradiol + progesterone_weight * p.progesterone.unwrap_or(0.0),
                )
            })
            .collect();
        days.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        days.into_iter().map(|(day, _)| day).collect()
    }
}

impl TryFrom<Vec<ReferencePoint>> for ReferenceCurve {
    type Error = HormosolError;

    fn try_from(points: Vec<ReferencePoint>) -> Result<Self, Self::Error> {
        ReferenceCurve::new(points)
    }
}

impl From<ReferenceCurve> for Vec<ReferencePoint> {
    fn from(curve: ReferenceCurve) -> Self {
        curve.points
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
