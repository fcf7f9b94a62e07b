//! Typed view over the raw named outputs a scoring artifact emits.
//!
//! Artifact outputs are named tensors keyed by string (`Price_Point`,
//! `Price_q5`, `Revenue_q95`, ...). Meaning is derived from the name exactly
//! once, here, so downstream reconciliation operates on structured data.

use std::collections::BTreeMap;
use tracing::debug;

/// Raw named outputs for one target family. BTreeMap keeps iteration order
/// deterministic for reproducible parsing.
pub type RawOutputs = BTreeMap<String, f64>;

/// One parsed scoring output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringOutput {
    /// Conditional-mean estimate.
    Point(f64),
    /// Estimate at a given percentile of the conditional distribution.
    Quantile { percentile: u8, value: f64 },
}

/// Parse every recognizable output name. Names that match neither the point
/// marker nor the quantile convention are skipped; a growing artifact must
/// not break older services.
pub fn parse_outputs(raw: &RawOutputs) -> Vec<ScoringOutput> {
    let mut parsed = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        if name.contains("Point") {
            parsed.push(ScoringOutput::Point(*value));
        } else if let Some(percentile) = parse_percentile(name) {
            parsed.push(ScoringOutput::Quantile {
                percentile,
                value: *value,
            });
        } else {
            debug!(output = %name, "skipping unrecognized scoring output");
        }
    }
    parsed
}

/// Quantile outputs embed their percentile as a `_q<int>` suffix.
fn parse_percentile(name: &str) -> Option<u8> {
    let (_, digits) = name.rsplit_once("_q")?;
    let percentile: u8 = digits.parse().ok()?;
    (percentile <= 100).then_some(percentile)
}
