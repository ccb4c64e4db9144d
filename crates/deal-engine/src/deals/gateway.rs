use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::domain::{Deal, DealId, DealStage, LicenseId};

/// CRM boundary used to read and mutate deals for a license.
pub trait DealGateway: Send + Sync {
    /// Deals attached to the license, in a stable order.
    fn deals_for_license(&self, license_id: &LicenseId) -> Result<Vec<Deal>, GatewayError>;
    fn create_deal(
        &self,
        license_id: &LicenseId,
        stage: DealStage,
        transaction_id: Option<&str>,
        on: NaiveDate,
    ) -> Result<Deal, GatewayError>;
    fn set_stage(
        &self,
        deal_id: &DealId,
        stage: DealStage,
        transaction_id: Option<&str>,
        on: NaiveDate,
    ) -> Result<Deal, GatewayError>;
    fn touch_deal(&self, deal_id: &DealId, on: NaiveDate) -> Result<Deal, GatewayError>;
}

/// Error enumeration for CRM gateway failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("deal {0} not found")]
    NotFound(DealId),
    #[error("crm unavailable: {0}")]
    Unavailable(String),
}

/// Process-local CRM stand-in that keeps deals in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDealGateway {
    deals: Arc<Mutex<Vec<Deal>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryDealGateway {
    pub fn with_deals(deals: Vec<Deal>) -> Self {
        Self {
            deals: Arc::new(Mutex::new(deals)),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> Result<Vec<Deal>, GatewayError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Deal>>, GatewayError> {
        self.deals
            .lock()
            .map_err(|_| GatewayError::Unavailable("deal store mutex poisoned".to_string()))
    }

    fn next_deal_id(&self, existing: &[Deal]) -> DealId {
        loop {
            let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let candidate = DealId(format!("deal-{id:06}"));
            if existing.iter().all(|deal| deal.id != candidate) {
                return candidate;
            }
        }
    }

    fn modify<F>(&self, deal_id: &DealId, change: F) -> Result<Deal, GatewayError>
    where
        F: FnOnce(&mut Deal),
    {
        let mut guard = self.lock()?;
        let deal = guard
            .iter_mut()
            .find(|deal| &deal.id == deal_id)
            .ok_or_else(|| GatewayError::NotFound(deal_id.clone()))?;
        change(deal);
        Ok(deal.clone())
    }
}

impl DealGateway for InMemoryDealGateway {
    fn deals_for_license(&self, license_id: &LicenseId) -> Result<Vec<Deal>, GatewayError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .filter(|deal| &deal.license_id == license_id)
            .cloned()
            .collect())
    }

    fn create_deal(
        &self,
        license_id: &LicenseId,
        stage: DealStage,
        transaction_id: Option<&str>,
        on: NaiveDate,
    ) -> Result<Deal, GatewayError> {
        let mut guard = self.lock()?;
        let id = self.next_deal_id(&guard);
        let mut deal = Deal::new(id.0, license_id.0.clone(), stage);
        deal.properties.last_touched = Some(on);
        deal.properties.transaction_id = transaction_id.map(str::to_string);
        if stage.is_closed() {
            deal.properties.closedate = Some(on);
        }
        guard.push(deal.clone());
        Ok(deal)
    }

    fn set_stage(
        &self,
        deal_id: &DealId,
        stage: DealStage,
        transaction_id: Option<&str>,
        on: NaiveDate,
    ) -> Result<Deal, GatewayError> {
        self.modify(deal_id, |deal| {
            // A closed deal stays bound to the transaction that closed it.
            if let Some(txn) = transaction_id.filter(|_| !deal.stage().is_closed()) {
                deal.properties.transaction_id = Some(txn.to_string());
            }
            deal.properties.dealstage = stage;
            deal.properties.last_touched = Some(on);
            if stage.is_closed() {
                deal.properties.closedate = Some(on);
            }
        })
    }

    fn touch_deal(&self, deal_id: &DealId, on: NaiveDate) -> Result<Deal, GatewayError> {
        self.modify(deal_id, |deal| {
            deal.properties.last_touched = Some(on);
        })
    }
}
