use serde::Serialize;
use std::fmt;

use super::domain::{Deal, DealId, DealRelevantEvent, DealStage, License, LicenseId};
use super::gateway::{DealGateway, GatewayError};
use super::matrix::{Decision, DecisionError, Outcome};

/// Concrete CRM mutation. Mutations that target an existing deal always
/// carry its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DealMutation {
    Create {
        license_id: LicenseId,
        stage: DealStage,
    },
    Close {
        deal_id: DealId,
        stage: DealStage,
    },
    Update {
        deal_id: DealId,
    },
}

impl DealMutation {
    pub fn target_deal(&self) -> Option<&DealId> {
        match self {
            Self::Create { .. } => None,
            Self::Close { deal_id, .. } | Self::Update { deal_id } => Some(deal_id),
        }
    }
}

impl fmt::Display for DealMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { license_id, stage } => {
                write!(f, "create {stage} deal for license {license_id}")
            }
            Self::Close { deal_id, stage } => write!(f, "close deal {deal_id} as {stage}"),
            Self::Update { deal_id } => write!(f, "touch deal {deal_id}"),
        }
    }
}

impl Decision<'_> {
    /// Resolves the decided outcome against the matched deal.
    ///
    /// A close or update without a representative deal means the rule table
    /// is malformed; the error is returned before anything is applied.
    pub fn into_mutation(self, license: &License) -> Result<DealMutation, DecisionError> {
        let missing = || DecisionError::MalformedRuleOutcome {
            rule: self.rule_index,
            outcome: self.outcome,
        };

        match self.outcome {
            Outcome::Create { stage } => Ok(DealMutation::Create {
                license_id: license.id.clone(),
                stage,
            }),
            Outcome::Close { stage } => {
                let deal = self.representative.ok_or_else(missing)?;
                Ok(DealMutation::Close {
                    deal_id: deal.id.clone(),
                    stage,
                })
            }
            Outcome::Update => {
                let deal = self.representative.ok_or_else(missing)?;
                Ok(DealMutation::Update {
                    deal_id: deal.id.clone(),
                })
            }
        }
    }
}

/// Performs exactly one gateway call for the mutation, stamped with the
/// triggering event's date and transaction.
pub fn apply_mutation<G>(
    gateway: &G,
    mutation: &DealMutation,
    event: &DealRelevantEvent,
) -> Result<Deal, GatewayError>
where
    G: DealGateway + ?Sized,
{
    let transaction_id = event.transaction_id.as_deref();
    let on = event.occurred_on;

    match mutation {
        DealMutation::Create { license_id, stage } => {
            gateway.create_deal(license_id, *stage, transaction_id, on)
        }
        DealMutation::Close { deal_id, stage } => {
            gateway.set_stage(deal_id, *stage, transaction_id, on)
        }
        DealMutation::Update { deal_id } => gateway.touch_deal(deal_id, on),
    }
}
