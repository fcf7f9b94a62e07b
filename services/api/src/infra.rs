use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rentscope::pricing::{
    FeatureVector, ModelLoadError, ModelLoader, PricingService, ScoringBundle, ScoringError,
    ScoringModel,
};
use rentscope::schema::ModelSchema;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type SharedPricingService = Arc<PricingService<BaselineModelLoader>>;

/// Symmetric z-scores for the quantile grid the training pipeline exports.
const QUANTILE_Z: &[(u8, f64)] = &[
    (5, -1.645),
    (25, -0.6745),
    (50, 0.0),
    (75, 0.6745),
    (95, 1.645),
];

/// In-process scoring backend used by the service binary and the demo
/// command. Derives named outputs from the staged target-encoding and
/// dispersion slots; the production ONNX runtime stays behind the
/// `ModelLoader` seam.
pub(crate) struct BaselineScoringModel {
    prefix: &'static str,
    base_slot: Option<usize>,
    spread_slot: Option<usize>,
    expected_len: usize,
    log_point: bool,
    relative_spread: f64,
}

impl ScoringModel for BaselineScoringModel {
    fn score(&self, features: &FeatureVector) -> Result<BTreeMap<String, f64>, ScoringError> {
        if features.len() != self.expected_len {
            return Err(ScoringError::DimensionMismatch {
                expected: self.expected_len,
                actual: features.len(),
            });
        }

        let base = self
            .base_slot
            .and_then(|slot| features.get(slot))
            .unwrap_or(0.0);
        let spread = self
            .spread_slot
            .and_then(|slot| features.get(slot))
            .filter(|spread| *spread > 0.0)
            .unwrap_or(base.abs() * self.relative_spread);

        let mut outputs = BTreeMap::new();
        let point = if self.log_point {
            (base + 1.0).ln()
        } else {
            base
        };
        outputs.insert(format!("{}_Point", self.prefix), point);
        for (percentile, z) in QUANTILE_Z {
            outputs.insert(
                format!("{}_q{}", self.prefix, percentile),
                (base + z * spread).max(0.0),
            );
        }
        Ok(outputs)
    }
}

pub(crate) struct BaselineModelLoader {
    schema: Arc<ModelSchema>,
}

impl BaselineModelLoader {
    pub(crate) fn new(schema: Arc<ModelSchema>) -> Self {
        Self { schema }
    }
}

impl ModelLoader for BaselineModelLoader {
    fn load(&self) -> Result<ScoringBundle, ModelLoadError> {
        let transforms = self.schema.transforms();
        Ok(ScoringBundle {
            price: Arc::new(BaselineScoringModel {
                prefix: "Price",
                base_slot: self.schema.feature_position("neighbourhood_cleansed_te_price"),
                spread_slot: self.schema.feature_position("neighborhood_price_std"),
                expected_len: self.schema.feature_count(),
                log_point: transforms.price_log_transform,
                relative_spread: 0.25,
            }),
            revenue: Arc::new(BaselineScoringModel {
                prefix: "Revenue",
                base_slot: self
                    .schema
                    .feature_position("neighbourhood_cleansed_te_revenue"),
                spread_slot: None,
                expected_len: self.schema.feature_count(),
                log_point: transforms.revenue_log_transform,
                relative_spread: 0.35,
            }),
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn pricing_service(schema: Arc<ModelSchema>) -> SharedPricingService {
    let loader = Arc::new(BaselineModelLoader::new(Arc::clone(&schema)));
    Arc::new(PricingService::new(schema, loader))
}

/// Built-in registry for the one-shot demo command, mirroring the structure
/// of the exported `models_metadata.json` on a handful of neighbourhoods.
pub(crate) fn demo_schema() -> ModelSchema {
    ModelSchema::from_value(json!({
        "feature_names": [
            "accommodates", "bedrooms", "bathrooms", "beds", "total_beds",
            "latitude", "longitude", "host_experience_years",
            "availability_365", "reviews_per_month", "review_scores_rating",
            "is_superhost", "identity_verified", "instant_bookable",
            "reviews_per_month_missing", "review_scores_rating_missing",
            "host_response_rate_clean", "host_response_rate_clean_missing",
            "host_acceptance_rate_clean", "host_acceptance_rate_clean_missing",
            "calculated_host_listings_count",
            "calculated_host_listings_count_missing",
            "review_scores_accuracy", "review_scores_accuracy_missing",
            "review_scores_cleanliness", "review_scores_cleanliness_missing",
            "review_scores_checkin", "review_scores_checkin_missing",
            "review_scores_communication", "review_scores_communication_missing",
            "review_scores_location", "review_scores_location_missing",
            "review_scores_value", "review_scores_value_missing",
            "has_wifi", "has_kitchen", "has_heating", "has_washer", "has_dryer",
            "has_air_conditioning", "has_free_parking_on_premises",
            "has_free_street_parking", "has_paid_parking_off_premises",
            "has_hot_tub", "has_pool", "has_gym", "has_pet_friendly",
            "has_business_travel_ready", "has_self_check_in", "has_lockbox",
            "has_elevator", "has_balcony", "has_garden", "has_bbq_grill",
            "neighborhood_price_mean", "neighborhood_price_median",
            "neighborhood_price_std",
            "neighborhood_estimated_revenue_l365d_mean",
            "neighborhood_estimated_revenue_l365d_median",
            "neighborhood_estimated_occupancy_l365d_mean",
            "nb_Downtown", "nb_Kitsilano", "nb_Mount Pleasant", "nb_West End",
            "rt_Entire home/apt", "rt_Private room", "rt_Shared room",
            "rt_Hotel room",
            "neighbourhood_cleansed", "property_type", "room_type",
            "neighbourhood_cleansed_te_price", "neighbourhood_cleansed_te_revenue",
            "property_type_te_price", "property_type_te_revenue",
            "name_len", "description_len",
            "dist_to_downtown", "rating_x_reviews",
            "guests_per_bedroom", "guests_per_bathroom",
            "txt_view", "txt_downtown", "txt_beach"
        ],
        "medians": {
            "host_response_rate_clean": 98.0,
            "host_acceptance_rate_clean": 92.0,
            "calculated_host_listings_count": 2.0,
            "review_scores_accuracy": 4.8,
            "review_scores_cleanliness": 4.8,
            "review_scores_checkin": 4.9,
            "review_scores_communication": 4.9,
            "review_scores_location": 4.8,
            "review_scores_value": 4.7,
            "name_len": 42.0,
            "description_len": 310.0
        },
        "neighbourhood_stats": {
            "Downtown": {
                "price_mean": 211.3, "price_median": 189.0, "price_std": 74.2,
                "revenue_mean": 41830.0, "revenue_median": 37900.0,
                "occupancy_mean": 0.71
            },
            "Kitsilano": {
                "price_mean": 187.6, "price_median": 172.0, "price_std": 61.8,
                "revenue_mean": 36210.0, "revenue_median": 33400.0,
                "occupancy_mean": 0.68
            },
            "Mount Pleasant": {
                "price_mean": 164.9, "price_median": 155.0, "price_std": 48.3,
                "revenue_mean": 31540.0, "revenue_median": 29750.0,
                "occupancy_mean": 0.66
            },
            "West End": {
                "price_mean": 196.4, "price_median": 178.0, "price_std": 66.1,
                "revenue_mean": 38460.0, "revenue_median": 35100.0,
                "occupancy_mean": 0.7
            }
        },
        "target_encoding": {
            "neighbourhood_cleansed": {
                "price": {
                    "Downtown": 205.7, "Kitsilano": 184.2,
                    "Mount Pleasant": 162.5, "West End": 193.8
                },
                "revenue": {
                    "Downtown": 41200.0, "Kitsilano": 35800.0,
                    "Mount Pleasant": 31100.0, "West End": 38000.0
                },
                "price_global": 176.4,
                "revenue_global": 34600.0
            },
            "property_type": {
                "price": {
                    "Entire condo": 198.2, "Entire rental unit": 182.9,
                    "Private room in home": 96.5, "Room in hotel": 228.4
                },
                "revenue": {
                    "Entire condo": 39400.0, "Entire rental unit": 36100.0,
                    "Private room in home": 19800.0, "Room in hotel": 45300.0
                },
                "price_global": 176.4,
                "revenue_global": 34600.0
            }
        },
        "label_encoding": {
            "neighbourhood_cleansed": {
                "Downtown": 0, "Kitsilano": 1, "Mount Pleasant": 2, "West End": 3
            },
            "property_type": {
                "Entire condo": 0, "Entire rental unit": 1,
                "Private room in home": 2, "Room in hotel": 3
            },
            "room_type": {
                "Entire home/apt": 0, "Private room": 1,
                "Shared room": 2, "Hotel room": 3
            }
        },
        "targets": { "price_log_transform": true, "revenue_log_transform": false }
    }))
    .expect("built-in demo registry is well-formed")
}
