use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::deals::domain::{Deal, DealId, DealRelevantEvent, DealStage, EventKind, License, LicenseId};
use crate::deals::gateway::{DealGateway, GatewayError, InMemoryDealGateway};
use crate::deals::matrix::DecisionMatrix;
use crate::deals::service::DealDecisionService;

pub(super) const HOSTINGS: [&str; 3] = ["Server", "Data Center", "Cloud"];

pub(super) fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).expect("valid date")
}

pub(super) fn deal(id: &str, stage: DealStage) -> Deal {
    Deal::new(id, "SEN-100", stage)
}

pub(super) fn license(hosting: &str) -> License {
    License::new("SEN-100", hosting)
}

pub(super) fn event(kind: EventKind, d: u32) -> DealRelevantEvent {
    DealRelevantEvent::new(kind, "SEN-100", day(d))
}

pub(super) fn transaction_event(kind: EventKind, d: u32, txn: &str) -> DealRelevantEvent {
    let mut event = event(kind, d);
    event.transaction_id = Some(txn.to_string());
    event
}

pub(super) fn matrix() -> DecisionMatrix {
    DecisionMatrix::standard()
}

pub(super) fn service_with(
    gateway: InMemoryDealGateway,
) -> (DealDecisionService<InMemoryDealGateway>, Arc<InMemoryDealGateway>) {
    let gateway = Arc::new(gateway);
    let service = DealDecisionService::new(Arc::new(matrix()), gateway.clone());
    (service, gateway)
}

pub(super) fn license_deals(gateway: &InMemoryDealGateway) -> Vec<Deal> {
    gateway
        .deals_for_license(&LicenseId("SEN-100".to_string()))
        .expect("read succeeds")
}

pub(super) struct OfflineGateway;

impl DealGateway for OfflineGateway {
    fn deals_for_license(&self, _license_id: &LicenseId) -> Result<Vec<Deal>, GatewayError> {
        Err(GatewayError::Unavailable("crm offline".to_string()))
    }

    fn create_deal(
        &self,
        _license_id: &LicenseId,
        _stage: DealStage,
        _transaction_id: Option<&str>,
        _on: NaiveDate,
    ) -> Result<Deal, GatewayError> {
        Err(GatewayError::Unavailable("crm offline".to_string()))
    }

    fn set_stage(
        &self,
        deal_id: &DealId,
        _stage: DealStage,
        _transaction_id: Option<&str>,
        _on: NaiveDate,
    ) -> Result<Deal, GatewayError> {
        Err(GatewayError::NotFound(deal_id.clone()))
    }

    fn touch_deal(&self, deal_id: &DealId, _on: NaiveDate) -> Result<Deal, GatewayError> {
        Err(GatewayError::NotFound(deal_id.clone()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
