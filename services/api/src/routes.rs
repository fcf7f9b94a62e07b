use crate::infra::{AppState, SharedPricingService};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{Local, NaiveDate};
use rentscope::error::AppError;
use rentscope::pricing::{
    host_experience_years, ListingDescription, ReconciledPrediction, RoomType, SessionStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct EstimateRequest {
    pub(crate) neighbourhood: String,
    pub(crate) property_type: String,
    #[serde(default)]
    pub(crate) room_type: Option<RoomType>,
    pub(crate) accommodates: u32,
    pub(crate) bedrooms: u32,
    pub(crate) bathrooms: f64,
    pub(crate) beds: u32,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    #[serde(default)]
    pub(crate) amenities: Vec<String>,
    #[serde(default)]
    pub(crate) superhost: bool,
    #[serde(default)]
    pub(crate) identity_verified: bool,
    #[serde(default)]
    pub(crate) instant_bookable: bool,
    /// Host tenure as a date; converted to years at this edge so the core
    /// stays pure.
    #[serde(default)]
    pub(crate) host_since: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) host_experience_years: Option<f64>,
    #[serde(default)]
    pub(crate) availability_365: u32,
    #[serde(default)]
    pub(crate) reviews_per_month: f64,
    #[serde(default)]
    pub(crate) review_rating: f64,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

impl EstimateRequest {
    pub(crate) fn into_listing(self, today: NaiveDate) -> ListingDescription {
        let experience = self
            .host_experience_years
            .or_else(|| {
                self.host_since
                    .map(|since| host_experience_years(since, today))
            })
            .unwrap_or(0.0);

        ListingDescription {
            neighbourhood: self.neighbourhood,
            property_type: self.property_type,
            room_type: self.room_type,
            accommodates: self.accommodates,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            beds: self.beds,
            latitude: self.latitude,
            longitude: self.longitude,
            amenities: self.amenities,
            superhost: self.superhost,
            identity_verified: self.identity_verified,
            instant_bookable: self.instant_bookable,
            host_experience_years: experience,
            availability_365: self.availability_365,
            reviews_per_month: self.reviews_per_month,
            review_rating: self.review_rating,
            name_length: self.name.map(|name| name.chars().count() as u32),
            description_length: self
                .description
                .map(|description| description.chars().count() as u32),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EstimateResponse {
    pub(crate) price: ReconciledPrediction,
    pub(crate) revenue: ReconciledPrediction,
}

pub(crate) fn app_router(service: SharedPricingService) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/estimate", axum::routing::post(estimate_endpoint))
        .with_state(service)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(
    State(service): State<SharedPricingService>,
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    let bound = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let session = service.session().status();

    let ready = bound && session == SessionStatus::Ready;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = json!({
        "status": if ready { "ready" } else { "initializing" },
        "scoring_session": session.label(),
    });

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn estimate_endpoint(
    State(service): State<SharedPricingService>,
    Json(payload): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, AppError> {
    let listing = payload.into_listing(Local::now().date_naive());
    listing.validate()?;

    let report = service.predict(&listing).await?;

    Ok(Json(EstimateResponse {
        price: report.price,
        revenue: report.revenue,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{demo_schema, pricing_service};
    use metrics_exporter_prometheus::PrometheusHandle;
    use std::sync::{Arc, OnceLock};

    /// The Prometheus recorder is process-global and may be installed only
    /// once. Several tests in this module each need a handle for `AppState`,
    /// so install it a single time and share the handle across them.
    fn shared_metrics() -> Arc<PrometheusHandle> {
        use axum_prometheus::PrometheusMetricLayer;
        static HANDLE: OnceLock<Arc<PrometheusHandle>> = OnceLock::new();
        HANDLE
            .get_or_init(|| {
                let (_layer, handle) = PrometheusMetricLayer::pair();
                Arc::new(handle)
            })
            .clone()
    }

    fn sample_request() -> EstimateRequest {
        EstimateRequest {
            neighbourhood: "Downtown".to_string(),
            property_type: "Entire condo".to_string(),
            room_type: None,
            accommodates: 2,
            bedrooms: 1,
            bathrooms: 1.0,
            beds: 1,
            latitude: 49.2827,
            longitude: -123.1207,
            amenities: vec!["Wifi".to_string(), "Kitchen".to_string()],
            superhost: true,
            identity_verified: true,
            instant_bookable: false,
            host_since: NaiveDate::from_ymd_opt(2021, 6, 1),
            host_experience_years: None,
            availability_365: 220,
            reviews_per_month: 2.1,
            review_rating: 4.8,
            name: Some("Bright downtown condo with skyline view".to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn estimate_endpoint_returns_coherent_families() {
        let service = pricing_service(Arc::new(demo_schema()));

        let Json(body) = estimate_endpoint(State(service), Json(sample_request()))
            .await
            .expect("estimate succeeds");

        for family in [&body.price, &body.revenue] {
            let ordered: Vec<i64> = [5u8, 25, 50, 75, 95]
                .iter()
                .filter_map(|p| family.distribution.get(&format!("q{p}")).copied())
                .collect();
            let mut sorted = ordered.clone();
            sorted.sort_unstable();
            assert_eq!(ordered, sorted, "distribution must be monotonic");
        }
        assert!(body.price.estimate > 0);
        assert!(body.revenue.estimate > 0);
    }

    #[tokio::test]
    async fn estimate_endpoint_rejects_invalid_listings() {
        let service = pricing_service(Arc::new(demo_schema()));

        let mut request = sample_request();
        request.review_rating = 9.0;

        let err = estimate_endpoint(State(service), Json(request))
            .await
            .expect_err("rating outside [0, 5] is rejected");
        assert!(matches!(err, AppError::Listing(_)));
    }

    #[tokio::test]
    async fn host_since_converts_to_experience_years() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date");
        let mut request = sample_request();
        request.host_since = NaiveDate::from_ymd_opt(2020, 8, 6);
        request.host_experience_years = None;

        let listing = request.into_listing(today);
        assert!((listing.host_experience_years - 6.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn router_serves_estimate_requests() {
        use axum::body::Body;
        use std::sync::atomic::AtomicBool;
        use tower::ServiceExt;

        let service = pricing_service(Arc::new(demo_schema()));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: shared_metrics(),
        };
        let app = app_router(service).layer(Extension(state));

        let payload = json!({
            "neighbourhood": "Kitsilano",
            "property_type": "Entire rental unit",
            "accommodates": 4,
            "bedrooms": 2,
            "bathrooms": 1.5,
            "beds": 2,
            "latitude": 49.2684,
            "longitude": -123.1569,
            "amenities": ["Wifi", "Washer"],
            "superhost": true,
            "review_rating": 4.7,
            "reviews_per_month": 1.9,
            "availability_365": 180
        });

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/v1/estimate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request builds");

        let response = app.oneshot(request).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body is json");
        assert!(body["price"]["estimate"].as_i64().expect("estimate present") > 0);
        assert!(body["revenue"]["distribution"]["Point"].is_i64());
    }

    #[tokio::test]
    async fn readiness_reports_session_lifecycle() {
        use std::sync::atomic::AtomicBool;

        let service = pricing_service(Arc::new(demo_schema()));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: shared_metrics(),
        };

        // Models not loaded yet: the endpoint must report initializing.
        let response = readiness_endpoint(
            State(Arc::clone(&service)),
            Extension(state.clone()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        service
            .session()
            .ensure_ready()
            .await
            .expect("baseline loads");

        let response = readiness_endpoint(State(service), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn raw_text_collapses_to_length_proxies() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date");
        let mut request = sample_request();
        request.name = Some("Cozy loft".to_string());
        request.description = Some("A".repeat(300));

        let listing = request.into_listing(today);
        assert_eq!(listing.name_length, Some(9));
        assert_eq!(listing.description_length, Some(300));
    }
}
