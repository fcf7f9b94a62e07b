use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Room-type taxonomy used by the scoring artifact. Labels must match the
/// category strings the encoders were fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    EntireHomeApt,
    PrivateRoom,
    SharedRoom,
    HotelRoom,
}

impl RoomType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EntireHomeApt => "Entire home/apt",
            Self::PrivateRoom => "Private room",
            Self::SharedRoom => "Shared room",
            Self::HotelRoom => "Hotel room",
        }
    }

    /// Derive the room type from a listing's property type. Unrecognized
    /// property types fall back to the most common room type in the market.
    pub fn from_property_type(property_type: &str) -> Self {
        property_room_map()
            .get(property_type.trim())
            .copied()
            .unwrap_or(Self::EntireHomeApt)
    }
}

static PROPERTY_ROOM_MAP: OnceLock<HashMap<&'static str, RoomType>> = OnceLock::new();

fn property_room_map() -> &'static HashMap<&'static str, RoomType> {
    PROPERTY_ROOM_MAP.get_or_init(|| {
        const PROPERTY_TO_ROOM: &[(&str, RoomType)] = &[
            ("Entire rental unit", RoomType::EntireHomeApt),
            ("Entire condo", RoomType::EntireHomeApt),
            ("Entire home", RoomType::EntireHomeApt),
            ("Entire house", RoomType::EntireHomeApt),
            ("Entire loft", RoomType::EntireHomeApt),
            ("Entire townhouse", RoomType::EntireHomeApt),
            ("Entire guest suite", RoomType::EntireHomeApt),
            ("Entire guesthouse", RoomType::EntireHomeApt),
            ("Entire serviced apartment", RoomType::EntireHomeApt),
            ("Entire cottage", RoomType::EntireHomeApt),
            ("Entire villa", RoomType::EntireHomeApt),
            ("Entire bungalow", RoomType::EntireHomeApt),
            ("Entire cabin", RoomType::EntireHomeApt),
            ("Private room in rental unit", RoomType::PrivateRoom),
            ("Private room in condo", RoomType::PrivateRoom),
            ("Private room in home", RoomType::PrivateRoom),
            ("Private room in house", RoomType::PrivateRoom),
            ("Private room in townhouse", RoomType::PrivateRoom),
            ("Private room in guest suite", RoomType::PrivateRoom),
            ("Private room in bed and breakfast", RoomType::PrivateRoom),
            ("Private room in loft", RoomType::PrivateRoom),
            ("Shared room in rental unit", RoomType::SharedRoom),
            ("Shared room in home", RoomType::SharedRoom),
            ("Shared room in hostel", RoomType::SharedRoom),
            ("Room in hotel", RoomType::HotelRoom),
            ("Room in boutique hotel", RoomType::HotelRoom),
            ("Room in aparthotel", RoomType::HotelRoom),
        ];

        PROPERTY_TO_ROOM.iter().copied().collect()
    })
}

/// A caller-supplied description of a property, constructed fresh per
/// request and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDescription {
    pub neighbourhood: String,
    pub property_type: String,
    /// Explicit room type wins; otherwise derived from the property type.
    #[serde(default)]
    pub room_type: Option<RoomType>,
    pub accommodates: u32,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub beds: u32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub superhost: bool,
    #[serde(default)]
    pub identity_verified: bool,
    #[serde(default)]
    pub instant_bookable: bool,
    #[serde(default)]
    pub host_experience_years: f64,
    #[serde(default)]
    pub availability_365: u32,
    #[serde(default)]
    pub reviews_per_month: f64,
    #[serde(default)]
    pub review_rating: f64,
    #[serde(default)]
    pub name_length: Option<u32>,
    #[serde(default)]
    pub description_length: Option<u32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ListingValidationError {
    #[error("neighbourhood must be a non-empty category key")]
    EmptyNeighbourhood,
    #[error("property_type must be a non-empty category key")]
    EmptyPropertyType,
    #[error("review_rating {0} outside [0, 5]")]
    RatingOutOfRange(f64),
    #[error("availability_365 {0} outside [0, 365]")]
    AvailabilityOutOfRange(u32),
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

impl ListingDescription {
    /// Upstream contract from the form/validation layer. The pricing core
    /// assumes this has passed before a listing reaches it.
    pub fn validate(&self) -> Result<(), ListingValidationError> {
        if self.neighbourhood.trim().is_empty() {
            return Err(ListingValidationError::EmptyNeighbourhood);
        }
        if self.property_type.trim().is_empty() {
            return Err(ListingValidationError::EmptyPropertyType);
        }
        if !(0.0..=5.0).contains(&self.review_rating) {
            return Err(ListingValidationError::RatingOutOfRange(self.review_rating));
        }
        if self.availability_365 > 365 {
            return Err(ListingValidationError::AvailabilityOutOfRange(
                self.availability_365,
            ));
        }
        for (field, value) in [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("bathrooms", self.bathrooms),
            ("reviews_per_month", self.reviews_per_month),
            ("host_experience_years", self.host_experience_years),
        ] {
            if !value.is_finite() {
                return Err(ListingValidationError::NotFinite { field });
            }
        }
        Ok(())
    }

    /// Effective room type: the explicit one when supplied, otherwise
    /// derived from the property type.
    pub fn effective_room_type(&self) -> RoomType {
        self.room_type
            .unwrap_or_else(|| RoomType::from_property_type(&self.property_type))
    }
}

/// Host tenure in years from a `host_since` date, floored at zero for
/// clock-skewed future dates.
pub fn host_experience_years(host_since: NaiveDate, today: NaiveDate) -> f64 {
    let days = (today - host_since).num_days();
    (days.max(0) as f64) / 365.25
}
