use crate::infra::{replay_feed, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use deal_engine::data_shift::{DataSet, DataShiftAnalyzer, DataShiftFinding};
use deal_engine::deals::feed::parse_feed;
use deal_engine::deals::{deal_router, Deal, DecisionMatrix, DecisionRecord};
use deal_engine::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ReplayRequest {
    pub(crate) feed_csv: String,
    #[serde(default)]
    pub(crate) deals: Vec<Deal>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReplayResponse {
    pub(crate) applied: usize,
    pub(crate) decisions: Vec<DecisionRecord>,
    pub(crate) deals: Vec<Deal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditRequest {
    pub(crate) snapshots: Vec<DataSet>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuditResponse {
    pub(crate) snapshots: usize,
    pub(crate) late_transaction_threshold_days: i64,
    pub(crate) findings: Vec<DataShiftFinding>,
}

pub(crate) fn with_deal_routes(matrix: Arc<DecisionMatrix>) -> axum::Router {
    deal_router(matrix)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/deals/replay",
            axum::routing::post(deal_replay_endpoint),
        )
        .route(
            "/api/v1/data-shift/audit",
            axum::routing::post(data_shift_audit_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn deal_replay_endpoint(
    Extension(matrix): Extension<Arc<DecisionMatrix>>,
    Json(payload): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>, AppError> {
    let ReplayRequest { feed_csv, deals } = payload;

    let entries = parse_feed(Cursor::new(feed_csv.into_bytes()))?;
    let outcome = replay_feed(matrix, entries, deals)?;

    Ok(Json(ReplayResponse {
        applied: outcome.applied(),
        decisions: outcome.decisions,
        deals: outcome.deals,
    }))
}

pub(crate) async fn data_shift_audit_endpoint(
    Extension(analyzer): Extension<DataShiftAnalyzer>,
    Json(payload): Json<AuditRequest>,
) -> Json<AuditResponse> {
    let findings = analyzer.run(&payload.snapshots);

    Json(AuditResponse {
        snapshots: payload.snapshots.len(),
        late_transaction_threshold_days: analyzer.late_transaction_threshold_days(),
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Response;
    use chrono::{TimeZone, Utc};
    use deal_engine::deals::{DealStage, DecisionAction};
    use std::sync::atomic::AtomicBool;

    const FEED: &str = "License ID,Hosting,Event,Date,Transaction ID\n\
SEN-5,Server,eval,2024-06-01,\n\
SEN-5,Server,purchase,2024-06-18,AT-55\n";

    fn state(ready: bool) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let pending = readiness_endpoint(Extension(state(false)))
            .await
            .into_response();
        assert_eq!(pending.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = readiness_endpoint(Extension(state(true)))
            .await
            .into_response();
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn replay_endpoint_applies_feed_to_seeded_deals() {
        let request = ReplayRequest {
            feed_csv: FEED.to_string(),
            deals: Vec::new(),
        };

        let Json(body) = deal_replay_endpoint(
            Extension(Arc::new(DecisionMatrix::standard())),
            Json(request),
        )
        .await
        .expect("replay succeeds");

        assert_eq!(body.applied, 2);
        assert!(matches!(
            body.decisions[1].action,
            DecisionAction::Applied { rule_index: 3, .. }
        ));
        assert_eq!(body.deals.len(), 1);
        assert_eq!(body.deals[0].stage(), DealStage::ClosedWon);
    }

    #[tokio::test]
    async fn replay_endpoint_rejects_unknown_event_kinds() {
        let request = ReplayRequest {
            feed_csv: "License ID,Hosting,Event,Date\nSEN-5,Server,trial,2024-06-01\n"
                .to_string(),
            deals: Vec::new(),
        };

        let response: Response = deal_replay_endpoint(
            Extension(Arc::new(DecisionMatrix::standard())),
            Json(request),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn audit_endpoint_reports_missing_licenses() {
        let snapshot = |day: u32, licenses: &[&str]| DataSet {
            timestamp: Utc
                .with_ymd_and_hms(2024, 6, day, 0, 0, 0)
                .single()
                .expect("valid timestamp"),
            licenses: licenses
                .iter()
                .map(|id| {
                    serde_json::from_value(json!({ "addonLicenseId": id }))
                        .expect("license parses")
                })
                .collect(),
            transactions: Vec::new(),
        };
        let request = AuditRequest {
            snapshots: vec![snapshot(1, &["SEN-1", "SEN-2"]), snapshot(2, &["SEN-1"])],
        };

        let Json(body) =
            data_shift_audit_endpoint(Extension(DataShiftAnalyzer::new(14)), Json(request)).await;

        assert_eq!(body.snapshots, 2);
        assert_eq!(body.late_transaction_threshold_days, 14);
        assert_eq!(body.findings.len(), 1);
    }
}
