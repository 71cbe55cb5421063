use crate::cli::ServeArgs;
use crate::infra::{seed_positions, AppState, InMemorySessionDirectory};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use interview_queue::config::AppConfig;
use interview_queue::error::AppError;
use interview_queue::scheduling::{ActivityWindow, Roster, SchedulingService};
use interview_queue::telemetry;
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

    let window = ActivityWindow::from_defaults(&config.scheduling, Utc::now());
    let scheduling_service = Arc::new(SchedulingService::with_system_clock(window));
    let roster = Roster::load(
        config.roster.users_csv.as_deref(),
        config.roster.positions_csv.as_deref(),
    )?;
    let seeded = seed_positions(&scheduling_service, &roster)?;
    let directory = Arc::new(InMemorySessionDirectory::from_users(&roster.users));
    info!(
        positions = seeded,
        users = directory.len(),
        "roster loaded"
    );

    let app = with_scheduling_routes(scheduling_service, directory)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "interview queue service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
