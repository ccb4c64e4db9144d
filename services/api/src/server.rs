use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_deal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use deal_engine::config::AppConfig;
use deal_engine::data_shift::DataShiftAnalyzer;
use deal_engine::deals::DecisionMatrix;
use deal_engine::error::AppError;
use deal_engine::telemetry;
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

    let matrix = Arc::new(DecisionMatrix::standard());
    let analyzer = DataShiftAnalyzer::from_config(&config.audit);

    let app = with_deal_routes(matrix.clone())
        .layer(Extension(matrix))
        .layer(Extension(analyzer))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        late_transaction_days = config.audit.late_transaction_threshold_days,
        "deal decision engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
