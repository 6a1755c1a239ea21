use crate::cli::ServeArgs;
use crate::infra::{AppState, IntakeApi};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_intake::config::AppConfig;
use placement_intake::error::AppError;
use placement_intake::telemetry;
use placement_intake::workflows::intake::IntakeService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let wizard = Arc::new(config.intake.wizard()?);
    let store = Arc::new(config.intake.store());
    let api = IntakeApi::new(Arc::new(IntakeService::new(wizard, store)));

    let app = with_intake_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        csv = %config.intake.csv_path.display(),
        "placement intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
