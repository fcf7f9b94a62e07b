use crate::infra::{demo_schema, parse_date, pricing_service};
use chrono::{Local, NaiveDate};
use clap::Args;
use rentscope::error::AppError;
use rentscope::pricing::{host_experience_years, ListingDescription, ReconciledPrediction};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EstimateArgs {
    /// Neighbourhood the listing sits in
    #[arg(long, default_value = "Downtown")]
    pub(crate) neighbourhood: String,
    /// Property type as it would appear on the listing
    #[arg(long, default_value = "Entire condo")]
    pub(crate) property_type: String,
    /// Maximum number of guests
    #[arg(long, default_value_t = 2)]
    pub(crate) accommodates: u32,
    #[arg(long, default_value_t = 1)]
    pub(crate) bedrooms: u32,
    #[arg(long, default_value_t = 1.0)]
    pub(crate) bathrooms: f64,
    #[arg(long, default_value_t = 1)]
    pub(crate) beds: u32,
    #[arg(long, default_value_t = 49.2827)]
    pub(crate) latitude: f64,
    #[arg(long, default_value_t = -123.1207)]
    pub(crate) longitude: f64,
    /// Amenity the listing offers (repeatable)
    #[arg(long = "amenity")]
    pub(crate) amenities: Vec<String>,
    #[arg(long)]
    pub(crate) superhost: bool,
    #[arg(long)]
    pub(crate) identity_verified: bool,
    #[arg(long)]
    pub(crate) instant_bookable: bool,
    /// Date the host joined the platform (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) host_since: Option<NaiveDate>,
    /// Nights available over the next year
    #[arg(long, default_value_t = 280)]
    pub(crate) availability: u32,
    #[arg(long, default_value_t = 1.5)]
    pub(crate) reviews_per_month: f64,
    /// Overall review rating in [0, 5]
    #[arg(long, default_value_t = 4.8)]
    pub(crate) rating: f64,
}

pub(crate) async fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let today = Local::now().date_naive();
    let listing = ListingDescription {
        neighbourhood: args.neighbourhood,
        property_type: args.property_type,
        room_type: None,
        accommodates: args.accommodates,
        bedrooms: args.bedrooms,
        bathrooms: args.bathrooms,
        beds: args.beds,
        latitude: args.latitude,
        longitude: args.longitude,
        amenities: args.amenities,
        superhost: args.superhost,
        identity_verified: args.identity_verified,
        instant_bookable: args.instant_bookable,
        host_experience_years: args
            .host_since
            .map(|since| host_experience_years(since, today))
            .unwrap_or(0.0),
        availability_365: args.availability,
        reviews_per_month: args.reviews_per_month,
        review_rating: args.rating,
        name_length: None,
        description_length: None,
    };
    listing.validate()?;

    let service = pricing_service(Arc::new(demo_schema()));
    let report = service.predict(&listing).await?;

    println!("Rentscope estimate");
    println!(
        "  {} · {} · {} guests · {} bd · {} ba · {} beds",
        listing.neighbourhood,
        listing.property_type,
        listing.accommodates,
        listing.bedrooms,
        listing.bathrooms,
        listing.beds
    );
    println!();
    print_family("Nightly price", "$", &report.price);
    println!();
    print_family("Annual revenue", "$", &report.revenue);

    Ok(())
}

fn print_family(title: &str, unit: &str, prediction: &ReconciledPrediction) {
    println!("{title}");
    println!("  point    {unit}{}", prediction.estimate);
    if let (Some(lower), Some(upper)) = (prediction.lower, prediction.upper) {
        println!("  range    {unit}{lower} - {unit}{upper} (90% interval)");
    }
    let quantiles: Vec<String> = [5u8, 25, 50, 75, 95]
        .iter()
        .filter_map(|p| {
            prediction
                .distribution
                .get(&format!("q{p}"))
                .map(|value| format!("q{p} {unit}{value}"))
        })
        .collect();
    if !quantiles.is_empty() {
        println!("  spread   {}", quantiles.join(" | "));
    }
}
