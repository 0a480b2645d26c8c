//! Paired comparison of compartment mass ratios.

use crate::error::QueryError;
use crate::models::CompartmentMassRatioTable;
use serde::Serialize;

/// A compartment plotted against two conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoint {
    pub compartment: String,
    pub x: f64,
    pub y: f64,
    /// Both values reach the label threshold.
    pub labelled: bool,
}

/// Two ratio columns side by side, untransformed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioScatter {
    pub first: String,
    pub second: String,
    pub points: Vec<RatioPoint>,
    /// Upper end of the y = x reference line.
    pub max_value: f64,
}

impl RatioScatter {
    pub fn labelled(&self) -> impl Iterator<Item = &RatioPoint> {
        self.points.iter().filter(|p| p.labelled)
    }
}

/// Pair two ratio columns. Compartments where both values are at least
/// `threshold` are marked for labelling. Rows with a missing value are
/// left out.
pub fn ratio_scatter(
    ratios: &CompartmentMassRatioTable,
    first: &str,
    second: &str,
    threshold: f64,
) -> Result<RatioScatter, QueryError> {
    let a = ratios.require_column(first)?;
    let b = ratios.require_column(second)?;

    let points: Vec<RatioPoint> = ratios
        .keys()
        .iter()
        .zip(a.iter().zip(b))
        .filter(|(_, (x, y))| x.is_finite() && y.is_finite())
        .map(|(compartment, (&x, &y))| RatioPoint {
            compartment: compartment.clone(),
            x,
            y,
            labelled: x >= threshold && y >= threshold,
        })
        .collect();

    let max_value = points
        .iter()
        .flat_map(|p| [p.x, p.y])
        .fold(0.0, f64::max);

    Ok(RatioScatter {
        first: first.to_string(),
        second: second.to_string(),
        points,
        max_value,
    })
}
