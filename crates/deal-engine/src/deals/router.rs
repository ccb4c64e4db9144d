use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::apply::DealMutation;
use super::domain::{Deal, EventKind, License, LicenseId};
use super::matrix::{DecisionMatrix, Outcome, RuleView};

/// Router exposing the rule table and single-event decisions.
pub fn deal_router(matrix: Arc<DecisionMatrix>) -> Router {
    Router::new()
        .route("/api/v1/deals/matrix", get(matrix_handler))
        .route("/api/v1/deals/decide", post(decide_handler))
        .with_state(matrix)
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub license_id: LicenseId,
    pub hosting: String,
    pub event: EventKind,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub decision: Option<DecisionView>,
}

#[derive(Debug, Serialize)]
pub struct DecisionView {
    pub rule_index: usize,
    pub rule: String,
    pub outcome: Outcome,
    pub mutation: DealMutation,
}

pub(crate) async fn matrix_handler(State(matrix): State<Arc<DecisionMatrix>>) -> Response {
    let rules: Vec<RuleView> = matrix.views();
    (StatusCode::OK, axum::Json(json!({ "rules": rules }))).into_response()
}

pub(crate) async fn decide_handler(
    State(matrix): State<Arc<DecisionMatrix>>,
    axum::Json(request): axum::Json<DecideRequest>,
) -> Response {
    let DecideRequest {
        license_id,
        hosting,
        event,
        deals,
    } = request;

    let Some(decision) = matrix.decide(&hosting, event, &deals) else {
        return (StatusCode::OK, axum::Json(DecideResponse { decision: None })).into_response();
    };

    let license = License {
        id: license_id,
        hosting,
    };
    let rule = matrix.rules()[decision.rule_index].to_string();

    match decision.into_mutation(&license) {
        Ok(mutation) => {
            let view = DecisionView {
                rule_index: decision.rule_index,
                rule,
                outcome: decision.outcome,
                mutation,
            };
            (
                StatusCode::OK,
                axum::Json(DecideResponse {
                    decision: Some(view),
                }),
            )
                .into_response()
        }
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
