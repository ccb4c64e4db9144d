use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::apply::{apply_mutation, DealMutation};
use super::domain::{Deal, DealId, DealRelevantEvent, EventKind, License, LicenseId};
use super::feed::FeedEntry;
use super::gateway::{DealGateway, GatewayError};
use super::matrix::{DecisionError, DecisionMatrix};

/// What happened for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DecisionAction {
    NoMatch,
    Applied {
        rule_index: usize,
        mutation: DealMutation,
        deal_id: DealId,
    },
}

/// Audit trail entry pairing an event with its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub license_id: LicenseId,
    pub event: DealRelevantEvent,
    pub action: DecisionAction,
}

impl DecisionRecord {
    pub fn mutation(&self) -> Option<&DealMutation> {
        match &self.action {
            DecisionAction::Applied { mutation, .. } => Some(mutation),
            DecisionAction::NoMatch => None,
        }
    }
}

/// Service composing the decision matrix with a CRM gateway.
pub struct DealDecisionService<G> {
    matrix: Arc<DecisionMatrix>,
    gateway: Arc<G>,
}

impl<G> DealDecisionService<G>
where
    G: DealGateway + 'static,
{
    pub fn new(matrix: Arc<DecisionMatrix>, gateway: Arc<G>) -> Self {
        Self { matrix, gateway }
    }

    pub fn matrix(&self) -> &DecisionMatrix {
        &self.matrix
    }

    /// Applies a license's events in chronological order.
    ///
    /// Deals are re-read before every event since each decision depends on
    /// the mutations applied for earlier ones, then narrowed with
    /// `Deal::relevant_to`. A refund that narrows to nothing falls back to
    /// every deal of the license. Events dated the same day keep their feed
    /// order.
    pub fn process_license(
        &self,
        license: &License,
        mut events: Vec<DealRelevantEvent>,
    ) -> Result<Vec<DecisionRecord>, DealServiceError> {
        events.sort_by_key(|event| event.occurred_on);
        let mut records = Vec::with_capacity(events.len());

        for event in events {
            if event.license_id != license.id {
                warn!(
                    license = %license.id,
                    event_license = %event.license_id,
                    "skipping event recorded against another license"
                );
                continue;
            }

            let deals = deals_in_scope(self.gateway.deals_for_license(&license.id)?, &event);
            let action = match self.matrix.decide(&license.hosting, event.kind, &deals) {
                None => {
                    debug!(
                        license = %license.id,
                        hosting = %license.hosting,
                        event = %event.kind,
                        deals = deals.len(),
                        "no rule matched"
                    );
                    DecisionAction::NoMatch
                }
                Some(decision) => {
                    let rule_index = decision.rule_index;
                    let mutation = decision.into_mutation(license)?;
                    let deal = apply_mutation(self.gateway.as_ref(), &mutation, &event)?;
                    info!(
                        license = %license.id,
                        event = %event.kind,
                        rule = rule_index,
                        %mutation,
                        "applied deal mutation"
                    );
                    DecisionAction::Applied {
                        rule_index,
                        mutation,
                        deal_id: deal.id,
                    }
                }
            };

            records.push(DecisionRecord {
                license_id: license.id.clone(),
                event,
                action,
            });
        }

        Ok(records)
    }

    /// Groups a feed by license and processes each license independently.
    ///
    /// Licenses are handled in order of first appearance. A license's hosting
    /// comes from its first feed entry.
    pub fn process_feed(
        &self,
        entries: Vec<FeedEntry>,
    ) -> Result<Vec<DecisionRecord>, DealServiceError> {
        let mut order: Vec<License> = Vec::new();
        let mut grouped: HashMap<LicenseId, Vec<DealRelevantEvent>> = HashMap::new();

        for FeedEntry { license, event } in entries {
            match order.iter().find(|known| known.id == license.id) {
                Some(known) if known.hosting != license.hosting => {
                    warn!(
                        license = %license.id,
                        first = %known.hosting,
                        ignored = %license.hosting,
                        "hosting changed within feed"
                    );
                }
                Some(_) => {}
                None => order.push(license.clone()),
            }
            grouped.entry(license.id).or_default().push(event);
        }

        let mut records = Vec::new();
        for license in order {
            let events = grouped.remove(&license.id).unwrap_or_default();
            records.extend(self.process_license(&license, events)?);
        }

        info!(decisions = records.len(), "feed processed");
        Ok(records)
    }
}

fn deals_in_scope(deals: Vec<Deal>, event: &DealRelevantEvent) -> Vec<Deal> {
    let (relevant, hidden): (Vec<_>, Vec<_>) =
        deals.into_iter().partition(|deal| deal.relevant_to(event));

    if relevant.is_empty() && !hidden.is_empty() && event.kind == EventKind::Refund {
        debug!(
            license = %event.license_id,
            transaction = ?event.transaction_id,
            deals = hidden.len(),
            "refund matches no bound deal, deciding against every deal"
        );
        return hidden;
    }
    relevant
}

/// Error raised by the deal decision service.
#[derive(Debug, thiserror::Error)]
pub enum DealServiceError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
