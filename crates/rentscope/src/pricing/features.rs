//! Deterministic encoding of a listing description into the fixed-order
//! numeric vector the scoring artifact expects.
//!
//! Slots are staged by name and emitted by walking the schema's
//! `feature_names` in order; any slot the builder never stages emits 0.0.
//! That default keeps the builder forward-compatible when the artifact grows
//! new columns (keyword `txt_*` slots in particular), so the exact staged set
//! is pinned by tests instead.

use crate::pricing::listing::ListingDescription;
use crate::schema::ModelSchema;
use std::collections::HashMap;
use thiserror::Error;

/// Fixed reference point for the distance feature: downtown Vancouver.
pub const DOWNTOWN_LAT: f64 = 49.2827;
pub const DOWNTOWN_LON: f64 = -123.1207;

// Planar approximation constants at this latitude.
const KM_PER_DEGREE_LAT: f64 = 111.0;
const KM_PER_DEGREE_LON: f64 = 71.0;

// Fallbacks when neither the listing nor the registry supplies a text length.
const NAME_LEN_DEFAULT: f64 = 40.0;
const DESCRIPTION_LEN_DEFAULT: f64 = 250.0;

const NEIGHBOURHOOD_PREFIX: &str = "nb_";
const ROOM_TYPE_PREFIX: &str = "rt_";

/// Sentinel for label-encoded categories absent from the registry. Valid
/// codes are non-negative, so the sentinel never collides with a real
/// category (including whichever one was assigned code 0).
pub const UNKNOWN_CATEGORY_CODE: f64 = -1.0;

/// Features the model expects but the interactive description does not
/// collect. Always imputed from the registry median with the companion
/// `<name>_missing` indicator raised.
const IMPUTED_FEATURES: &[&str] = &[
    "host_response_rate_clean",
    "host_acceptance_rate_clean",
    "calculated_host_listings_count",
    "review_scores_accuracy",
    "review_scores_cleanliness",
    "review_scores_checkin",
    "review_scores_communication",
    "review_scores_location",
    "review_scores_value",
];

/// Amenity indicator columns fitted during training, with their slot names.
const TRACKED_AMENITIES: &[(&str, &str)] = &[
    ("Wifi", "has_wifi"),
    ("Kitchen", "has_kitchen"),
    ("Heating", "has_heating"),
    ("Washer", "has_washer"),
    ("Dryer", "has_dryer"),
    ("Air conditioning", "has_air_conditioning"),
    ("Free parking on premises", "has_free_parking_on_premises"),
    ("Free street parking", "has_free_street_parking"),
    ("Paid parking off premises", "has_paid_parking_off_premises"),
    ("Hot tub", "has_hot_tub"),
    ("Pool", "has_pool"),
    ("Gym", "has_gym"),
    ("Pet-friendly", "has_pet_friendly"),
    ("Business travel ready", "has_business_travel_ready"),
    ("Self check-in", "has_self_check_in"),
    ("Lockbox", "has_lockbox"),
    ("Elevator", "has_elevator"),
    ("Balcony", "has_balcony"),
    ("Garden", "has_garden"),
    ("BBQ grill", "has_bbq_grill"),
];

const TARGET_ENCODED_COLUMNS: &[&str] = &["neighbourhood_cleansed", "property_type"];

#[derive(Debug, Error)]
pub enum FeatureError {
    /// A field with no graceful default reached the builder. This is a
    /// contract violation against the upstream validation layer, not a
    /// user-facing condition.
    #[error("listing field '{0}' is required and was not validated upstream")]
    MissingField(&'static str),
}

/// Fixed-length ordered vector matching the schema's positional contract.
/// Immutable once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wrap an already-ordered slice of slot values. The caller is
    /// responsible for matching the schema's positional contract.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FeatureStaging {
    slots: HashMap<String, f64>,
}

impl FeatureStaging {
    fn set(&mut self, name: impl Into<String>, value: f64) {
        self.slots.insert(name.into(), value);
    }

    pub(crate) fn get(&self, name: &str) -> Option<f64> {
        self.slots.get(name).copied()
    }

    pub(crate) fn staged_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn emit(&self, schema: &ModelSchema) -> FeatureVector {
        let values = schema
            .feature_names()
            .iter()
            .map(|name| self.slots.get(name).copied().unwrap_or(0.0))
            .collect();
        FeatureVector { values }
    }
}

/// Encode a listing against the registry. Pure: identical inputs always
/// yield an identical vector.
pub fn build_feature_vector(
    listing: &ListingDescription,
    schema: &ModelSchema,
) -> Result<FeatureVector, FeatureError> {
    Ok(stage_features(listing, schema)?.emit(schema))
}

pub(crate) fn stage_features(
    listing: &ListingDescription,
    schema: &ModelSchema,
) -> Result<FeatureStaging, FeatureError> {
    if listing.neighbourhood.trim().is_empty() {
        return Err(FeatureError::MissingField("neighbourhood"));
    }
    if listing.property_type.trim().is_empty() {
        return Err(FeatureError::MissingField("property_type"));
    }

    let mut staging = FeatureStaging::default();
    stage_direct(listing, &mut staging);
    stage_imputed(schema, &mut staging);
    stage_amenities(listing, &mut staging);
    stage_neighbourhood_stats(listing, schema, &mut staging);
    stage_one_hot(listing, &mut staging);
    stage_label_encoded(listing, schema, &mut staging);
    stage_target_encoded(listing, schema, &mut staging);
    stage_text_proxies(listing, schema, &mut staging);
    stage_derived(listing, &mut staging);
    Ok(staging)
}

fn stage_direct(listing: &ListingDescription, staging: &mut FeatureStaging) {
    staging.set("accommodates", f64::from(listing.accommodates));
    staging.set("bedrooms", f64::from(listing.bedrooms));
    staging.set("bathrooms", listing.bathrooms);
    staging.set("beds", f64::from(listing.beds));
    staging.set("total_beds", f64::from(listing.beds));
    staging.set("latitude", listing.latitude);
    staging.set("longitude", listing.longitude);
    staging.set("host_experience_years", listing.host_experience_years);
    staging.set("availability_365", f64::from(listing.availability_365));
    staging.set("reviews_per_month", listing.reviews_per_month);
    staging.set("review_scores_rating", listing.review_rating);
    staging.set("is_superhost", bool_slot(listing.superhost));
    staging.set("identity_verified", bool_slot(listing.identity_verified));
    staging.set("instant_bookable", bool_slot(listing.instant_bookable));
    // Collected fields may legitimately be zero; an observed 0 is a value,
    // not a gap, so their missing indicators stay down.
    staging.set("reviews_per_month_missing", 0.0);
    staging.set("review_scores_rating_missing", 0.0);
}

fn stage_imputed(schema: &ModelSchema, staging: &mut FeatureStaging) {
    for name in IMPUTED_FEATURES {
        staging.set(*name, schema.median(name).unwrap_or(0.0));
        staging.set(format!("{name}_missing"), 1.0);
    }
}

fn stage_amenities(listing: &ListingDescription, staging: &mut FeatureStaging) {
    for (amenity, slot) in TRACKED_AMENITIES {
        let present = listing
            .amenities
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(amenity));
        staging.set(*slot, bool_slot(present));
    }
}

fn stage_neighbourhood_stats(
    listing: &ListingDescription,
    schema: &ModelSchema,
    staging: &mut FeatureStaging,
) {
    // Unknown neighbourhoods contribute zeros rather than failing the request.
    let stats = schema
        .neighbourhood(listing.neighbourhood.trim())
        .copied()
        .unwrap_or_default();
    staging.set("neighborhood_price_mean", stats.price_mean);
    staging.set("neighborhood_price_median", stats.price_median);
    staging.set("neighborhood_price_std", stats.price_std);
    staging.set(
        "neighborhood_estimated_revenue_l365d_mean",
        stats.revenue_mean,
    );
    staging.set(
        "neighborhood_estimated_revenue_l365d_median",
        stats.revenue_median,
    );
    staging.set(
        "neighborhood_estimated_occupancy_l365d_mean",
        stats.occupancy_mean,
    );
}

fn stage_one_hot(listing: &ListingDescription, staging: &mut FeatureStaging) {
    // Exactly one slot per category; every other one-hot slot stays at the
    // emission default of 0.
    staging.set(
        format!("{NEIGHBOURHOOD_PREFIX}{}", listing.neighbourhood.trim()),
        1.0,
    );
    staging.set(
        format!("{ROOM_TYPE_PREFIX}{}", listing.effective_room_type().label()),
        1.0,
    );
}

fn stage_label_encoded(
    listing: &ListingDescription,
    schema: &ModelSchema,
    staging: &mut FeatureStaging,
) {
    let room_label = listing.effective_room_type().label();
    let columns: [(&str, &str); 3] = [
        ("neighbourhood_cleansed", listing.neighbourhood.trim()),
        ("property_type", listing.property_type.trim()),
        ("room_type", room_label),
    ];
    for (column, value) in columns {
        let code = schema
            .label_code(column, value)
            .map(|code| code as f64)
            .unwrap_or(UNKNOWN_CATEGORY_CODE);
        staging.set(column, code);
    }
}

fn stage_target_encoded(
    listing: &ListingDescription,
    schema: &ModelSchema,
    staging: &mut FeatureStaging,
) {
    for column in TARGET_ENCODED_COLUMNS {
        let value = match *column {
            "neighbourhood_cleansed" => listing.neighbourhood.trim(),
            _ => listing.property_type.trim(),
        };
        let (price, revenue) = match schema.target_encoding(column) {
            Some(encoding) => (
                encoding
                    .price
                    .get(value)
                    .copied()
                    .unwrap_or(encoding.price_global),
                encoding
                    .revenue
                    .get(value)
                    .copied()
                    .unwrap_or(encoding.revenue_global),
            ),
            None => (0.0, 0.0),
        };
        staging.set(format!("{column}_te_price"), price);
        staging.set(format!("{column}_te_revenue"), revenue);
    }
}

fn stage_text_proxies(
    listing: &ListingDescription,
    schema: &ModelSchema,
    staging: &mut FeatureStaging,
) {
    let name_len = listing
        .name_length
        .map(f64::from)
        .or_else(|| schema.median("name_len"))
        .unwrap_or(NAME_LEN_DEFAULT);
    let description_len = listing
        .description_length
        .map(f64::from)
        .or_else(|| schema.median("description_len"))
        .unwrap_or(DESCRIPTION_LEN_DEFAULT);
    staging.set("name_len", name_len);
    staging.set("description_len", description_len);
}

fn stage_derived(listing: &ListingDescription, staging: &mut FeatureStaging) {
    let dy = (listing.latitude - DOWNTOWN_LAT) * KM_PER_DEGREE_LAT;
    let dx = (listing.longitude - DOWNTOWN_LON) * KM_PER_DEGREE_LON;
    staging.set("dist_to_downtown", (dx * dx + dy * dy).sqrt());

    staging.set(
        "rating_x_reviews",
        listing.review_rating * listing.reviews_per_month,
    );

    // Denominators floored at 1: studios and zero-bath data entry must not
    // divide by zero.
    let bedrooms = f64::from(listing.bedrooms.max(1));
    let bathrooms = listing.bathrooms.max(1.0);
    staging.set(
        "guests_per_bedroom",
        f64::from(listing.accommodates) / bedrooms,
    );
    staging.set(
        "guests_per_bathroom",
        f64::from(listing.accommodates) / bathrooms,
    );
}

fn bool_slot(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
