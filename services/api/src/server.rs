use crate::cli::ServeArgs;
use crate::infra::{pricing_service, AppState};
use crate::routes::app_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rentscope::config::AppConfig;
use rentscope::error::AppError;
use rentscope::schema::ModelSchema;
use rentscope::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    // A missing or malformed schema artifact has no meaningful fallback;
    // abort startup rather than serving garbage vectors.
    let schema = Arc::new(ModelSchema::from_path(&config.model.schema_path)?);
    info!(
        features = schema.feature_count(),
        path = %config.model.schema_path.display(),
        "schema registry loaded"
    );

    let service = pricing_service(schema);

    // Warm the scoring session so the first request does not pay the load
    // cost. Failures here are retried on demand thanks to single-flight.
    {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(err) = service.session().ensure_ready().await {
                warn!(error = %err, "scoring warmup failed; will retry on first request");
            }
        });
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = app_router(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "pricing estimator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
