//! Reconciliation of raw scoring outputs into a coherent prediction.
//!
//! Raw quantile estimates come from independently trained sub-models and may
//! cross; the point estimate may live in log space while the quantiles do
//! not. This module is where those raw numbers become one internally
//! consistent object.

use crate::pricing::outputs::{parse_outputs, RawOutputs, ScoringOutput};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Distribution key reserved for the point estimate.
pub const POINT_KEY: &str = "Point";

const LOWER_PERCENTILE: u8 = 5;
const UPPER_PERCENTILE: u8 = 95;

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    /// The artifact emitted no point estimate for this family. Returning a
    /// zeroed prediction here would silently mask a broken export.
    #[error("no point-estimate output found in raw model output")]
    MissingPoint,
    #[error("multiple point-estimate outputs found in raw model output")]
    DuplicatePoint,
    /// Two raw outputs claimed the same percentile. The artifact contract
    /// names each quantile once; overwriting one silently would hide a
    /// broken export.
    #[error("duplicate quantile output for percentile {0}")]
    DuplicatePercentile(u8),
}

/// A validated, monotonic, human-usable prediction for one target family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledPrediction {
    pub estimate: i64,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    /// Percentile label (`"q5"`, ..., `"q95"`) or [`POINT_KEY`] to rounded value.
    pub distribution: BTreeMap<String, i64>,
}

/// Reconcile one target family's raw outputs. `log_transform` marks a point
/// estimator trained on `log1p` of the target; quantile estimators are
/// always linear and never inverse-transformed.
pub fn reconcile(
    raw: &RawOutputs,
    log_transform: bool,
) -> Result<ReconciledPrediction, ReconcileError> {
    let mut point: Option<f64> = None;
    let mut quantiles: Vec<(u8, f64)> = Vec::new();

    for output in parse_outputs(raw) {
        match output {
            ScoringOutput::Point(value) => {
                if point.replace(value).is_some() {
                    return Err(ReconcileError::DuplicatePoint);
                }
            }
            ScoringOutput::Quantile { percentile, value } => {
                if quantiles.iter().any(|(existing, _)| *existing == percentile) {
                    return Err(ReconcileError::DuplicatePercentile(percentile));
                }
                quantiles.push((percentile, value));
            }
        }
    }

    let raw_point = point.ok_or(ReconcileError::MissingPoint)?;
    let estimate = if log_transform {
        round(raw_point.exp() - 1.0)
    } else {
        round(raw_point)
    };

    // Rearrangement: sorting the values independently of their percentiles
    // guarantees no crossing quantiles without assuming which individual
    // estimator was miscalibrated.
    quantiles.sort_by_key(|(percentile, _)| *percentile);
    let mut values: Vec<f64> = quantiles.iter().map(|(_, value)| *value).collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let mut distribution = BTreeMap::new();
    let mut lower = None;
    let mut upper = None;
    for ((percentile, _), value) in quantiles.iter().zip(values) {
        let rounded = round(value);
        distribution.insert(format!("q{percentile}"), rounded);
        if *percentile == LOWER_PERCENTILE {
            lower = Some(rounded);
        }
        if *percentile == UPPER_PERCENTILE {
            upper = Some(rounded);
        }
    }
    distribution.insert(POINT_KEY.to_string(), estimate);

    Ok(ReconciledPrediction {
        estimate,
        lower,
        upper,
        distribution,
    })
}

fn round(value: f64) -> i64 {
    value.round() as i64
}
