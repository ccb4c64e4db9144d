use deal_engine::deals::{
    Deal, DealDecisionService, DealServiceError, DecisionMatrix, DecisionRecord, FeedEntry,
    InMemoryDealGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Decisions from one replay together with the resulting deal store.
#[derive(Debug)]
pub(crate) struct ReplayOutcome {
    pub(crate) decisions: Vec<DecisionRecord>,
    pub(crate) deals: Vec<Deal>,
}

impl ReplayOutcome {
    pub(crate) fn applied(&self) -> usize {
        self.decisions
            .iter()
            .filter(|record| record.mutation().is_some())
            .count()
    }
}

/// Runs a feed against a fresh in-memory CRM seeded with `deals`.
pub(crate) fn replay_feed(
    matrix: Arc<DecisionMatrix>,
    entries: Vec<FeedEntry>,
    deals: Vec<Deal>,
) -> Result<ReplayOutcome, DealServiceError> {
    let gateway = Arc::new(InMemoryDealGateway::with_deals(deals));
    let service = DealDecisionService::new(matrix, gateway.clone());
    let decisions = service.process_feed(entries)?;
    let deals = gateway.snapshot()?;
    Ok(ReplayOutcome { decisions, deals })
}
