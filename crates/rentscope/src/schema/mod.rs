//! Registry describing the trained scoring artifact's expected inputs.
//!
//! Loaded once at startup from the versioned `models_metadata.json` document
//! the training pipeline exports next to the model files. Read-only for the
//! process lifetime; a changed artifact means a whole-process reload.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unable to read schema artifact at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schema artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema artifact lists no feature names")]
    NoFeatures,
    #[error("feature name '{0}' appears more than once in the schema artifact")]
    DuplicateFeature(String),
}

/// Aggregate statistics for one neighbourhood, computed over the training
/// split. Absent fields deserialize to 0, matching the training export for
/// neighbourhoods with too few listings for a stable std.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NeighbourhoodStats {
    #[serde(default)]
    pub price_mean: f64,
    #[serde(default)]
    pub price_median: f64,
    #[serde(default)]
    pub price_std: f64,
    #[serde(default)]
    pub revenue_mean: f64,
    #[serde(default)]
    pub revenue_median: f64,
    #[serde(default)]
    pub occupancy_mean: f64,
}

/// Learned target-encoding table for one categorical column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetEncodingColumn {
    #[serde(default)]
    pub price: HashMap<String, f64>,
    #[serde(default)]
    pub revenue: HashMap<String, f64>,
    #[serde(default)]
    pub price_global: f64,
    #[serde(default)]
    pub revenue_global: f64,
}

/// Whether each family's point estimator was trained on `log1p` of the
/// target. Quantile estimators are always trained on the linear target.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TargetTransforms {
    #[serde(default)]
    pub price_log_transform: bool,
    #[serde(default)]
    pub revenue_log_transform: bool,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    feature_names: Vec<String>,
    #[serde(default)]
    medians: HashMap<String, f64>,
    #[serde(default)]
    neighbourhood_stats: HashMap<String, NeighbourhoodStats>,
    #[serde(default)]
    target_encoding: HashMap<String, TargetEncodingColumn>,
    #[serde(default)]
    label_encoding: HashMap<String, HashMap<String, i64>>,
    #[serde(default)]
    targets: TargetTransforms,
}

/// Immutable description of the scoring model's input contract.
#[derive(Debug)]
pub struct ModelSchema {
    feature_names: Vec<String>,
    positions: HashMap<String, usize>,
    medians: HashMap<String, f64>,
    neighbourhood_stats: HashMap<String, NeighbourhoodStats>,
    target_encoding: HashMap<String, TargetEncodingColumn>,
    label_encoding: HashMap<String, HashMap<String, i64>>,
    targets: TargetTransforms,
}

impl ModelSchema {
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let file = File::open(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_reader(reader)?;
        Self::from_document(document)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_value(value)?;
        Self::from_document(document)
    }

    fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        if document.feature_names.is_empty() {
            return Err(SchemaError::NoFeatures);
        }

        let mut positions = HashMap::with_capacity(document.feature_names.len());
        for (index, name) in document.feature_names.iter().enumerate() {
            if positions.insert(name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateFeature(name.clone()));
            }
        }

        Ok(Self {
            feature_names: document.feature_names,
            positions,
            medians: document.medians,
            neighbourhood_stats: document.neighbourhood_stats,
            target_encoding: document.target_encoding,
            label_encoding: document.label_encoding,
            targets: document.targets,
        })
    }

    /// Positional contract: slot `i` of every feature vector corresponds to
    /// `feature_names()[i]`.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn median(&self, name: &str) -> Option<f64> {
        self.medians.get(name).copied()
    }

    pub fn neighbourhood(&self, key: &str) -> Option<&NeighbourhoodStats> {
        self.neighbourhood_stats.get(key)
    }

    pub fn target_encoding(&self, column: &str) -> Option<&TargetEncodingColumn> {
        self.target_encoding.get(column)
    }

    pub fn label_code(&self, column: &str, value: &str) -> Option<i64> {
        self.label_encoding.get(column)?.get(value).copied()
    }

    pub fn transforms(&self) -> TargetTransforms {
        self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_empty_feature_list() {
        let err = ModelSchema::from_value(json!({ "feature_names": [] }))
            .expect_err("empty schema must not load");
        assert!(matches!(err, SchemaError::NoFeatures));
    }

    #[test]
    fn rejects_duplicate_feature_names() {
        let err = ModelSchema::from_value(json!({
            "feature_names": ["accommodates", "bedrooms", "accommodates"]
        }))
        .expect_err("duplicate names must not load");
        match err {
            SchemaError::DuplicateFeature(name) => assert_eq!(name, "accommodates"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partial_document_defaults_optional_tables() {
        let schema = ModelSchema::from_value(json!({
            "feature_names": ["accommodates", "bedrooms"]
        }))
        .expect("minimal schema loads");

        assert_eq!(schema.feature_count(), 2);
        assert_eq!(schema.feature_position("bedrooms"), Some(1));
        assert!(schema.median("accommodates").is_none());
        assert!(schema.neighbourhood("Downtown").is_none());
        assert!(schema.target_encoding("property_type").is_none());
        assert!(schema.label_code("room_type", "Entire home/apt").is_none());
        assert!(!schema.transforms().price_log_transform);
    }

    #[test]
    fn lookups_reflect_document_contents() {
        let schema = ModelSchema::from_value(json!({
            "feature_names": ["neighborhood_price_mean"],
            "medians": { "reviews_per_month": 1.2 },
            "neighbourhood_stats": {
                "Downtown": { "price_mean": 210.5, "price_std": 44.0 }
            },
            "target_encoding": {
                "property_type": {
                    "price": { "Entire condo": 198.0 },
                    "price_global": 150.0,
                    "revenue_global": 30000.0
                }
            },
            "label_encoding": {
                "room_type": { "Entire home/apt": 0, "Private room": 2 }
            },
            "targets": { "price_log_transform": true }
        }))
        .expect("schema loads");

        assert_eq!(schema.median("reviews_per_month"), Some(1.2));
        let downtown = schema.neighbourhood("Downtown").expect("stats present");
        assert_eq!(downtown.price_mean, 210.5);
        assert_eq!(downtown.revenue_mean, 0.0);
        let encoding = schema.target_encoding("property_type").expect("column");
        assert_eq!(encoding.price.get("Entire condo"), Some(&198.0));
        assert_eq!(encoding.price_global, 150.0);
        assert_eq!(schema.label_code("room_type", "Private room"), Some(2));
        assert_eq!(schema.label_code("room_type", "Castle"), None);
        assert!(schema.transforms().price_log_transform);
        assert!(!schema.transforms().revenue_log_transform);
    }
}
