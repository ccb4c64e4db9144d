use serde::Serialize;
use std::fmt;

use super::domain::{Deal, DealStage};

/// Query over the deals currently attached to a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatePredicate {
    HasNothing,
    HasTrial,
    HasNonLost,
    Any,
}

/// Successful state query, carrying the deal a mutation would target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMatch<'a> {
    pub representative: Option<&'a Deal>,
}

impl StatePredicate {
    /// Evaluates the query against deals in caller-supplied order.
    pub fn evaluate<'a>(self, deals: &'a [Deal]) -> Option<StateMatch<'a>> {
        match self {
            Self::HasNothing => deals
                .is_empty()
                .then_some(StateMatch {
                    representative: None,
                }),
            Self::HasTrial => deals
                .iter()
                .find(|deal| deal.stage() == DealStage::Eval)
                .map(|deal| StateMatch {
                    representative: Some(deal),
                }),
            Self::HasNonLost => deals
                .iter()
                .find(|deal| deal.stage() != DealStage::ClosedLost)
                .map(|deal| StateMatch {
                    representative: Some(deal),
                }),
            Self::Any => Some(StateMatch {
                representative: deals.first(),
            }),
        }
    }

    /// False when a match can never carry a representative deal.
    pub const fn can_supply_representative(self) -> bool {
        !matches!(self, Self::HasNothing)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::HasNothing => "no deals",
            Self::HasTrial => "has trial deal",
            Self::HasNonLost => "has non-lost deal",
            Self::Any => "any deals",
        }
    }
}

impl fmt::Display for StatePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
