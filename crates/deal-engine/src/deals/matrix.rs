use serde::Serialize;
use std::fmt;

use super::classify::{EventPredicate, HostingCategory, HostingPredicate};
use super::domain::{Deal, DealStage, EventKind};
use super::state::{StateMatch, StatePredicate};

/// CRM mutation requested by a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Create { stage: DealStage },
    Close { stage: DealStage },
    Update,
}

impl Outcome {
    /// Close and update target an existing deal; create never does.
    pub const fn requires_deal(self) -> bool {
        matches!(self, Self::Close { .. } | Self::Update)
    }

    pub const fn target_stage(self) -> Option<DealStage> {
        match self {
            Self::Create { stage } | Self::Close { stage } => Some(stage),
            Self::Update => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { stage } => write!(f, "create {stage}"),
            Self::Close { stage } => write!(f, "close {stage}"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// One row of the decision matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub hosting: HostingPredicate,
    pub event: EventPredicate,
    pub state: StatePredicate,
    pub outcome: Outcome,
}

impl Rule {
    pub const fn new(
        hosting: HostingPredicate,
        event: EventPredicate,
        state: StatePredicate,
        outcome: Outcome,
    ) -> Self {
        Self {
            hosting,
            event,
            state,
            outcome,
        }
    }

    fn matches<'a>(
        &self,
        category: Option<HostingCategory>,
        kind: EventKind,
        deals: &'a [Deal],
    ) -> Option<StateMatch<'a>> {
        if !self.hosting.matches(category) || !self.event.matches(kind) {
            return None;
        }
        self.state.evaluate(deals)
    }

    pub fn view(&self, index: usize) -> RuleView {
        RuleView {
            index,
            hosting: self.hosting.label(),
            event: self.event.label(),
            state: self.state.label(),
            outcome: self.outcome,
            description: self.to_string(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} -> {}",
            self.hosting, self.event, self.state, self.outcome
        )
    }
}

/// Flattened rule for documentation and API listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    pub index: usize,
    pub hosting: &'static str,
    pub event: &'static str,
    pub state: &'static str,
    pub outcome: Outcome,
    pub description: String,
}

/// Result of the first fully matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision<'a> {
    pub rule_index: usize,
    pub outcome: Outcome,
    pub representative: Option<&'a Deal>,
}

/// Errors raised when a rule table cannot produce a well-formed mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("rule {rule} pairs `{outcome}` with `{state}`, which never supplies a deal")]
    MalformedRule {
        rule: usize,
        outcome: Outcome,
        state: StatePredicate,
    },
    #[error("rule {rule} decided `{outcome}` without a representative deal")]
    MalformedRuleOutcome { rule: usize, outcome: Outcome },
}

/// Ordered priority list of rules; the first full match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionMatrix {
    rules: Vec<Rule>,
}

impl DecisionMatrix {
    /// Builds a matrix from hand-authored rules, keeping their order.
    pub fn new(rules: Vec<Rule>) -> Result<Self, DecisionError> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.outcome.requires_deal() && !rule.state.can_supply_representative() {
                return Err(DecisionError::MalformedRule {
                    rule: index,
                    outcome: rule.outcome,
                    state: rule.state,
                });
            }
        }
        Ok(Self { rules })
    }

    /// The production rule table.
    pub fn standard() -> Self {
        Self {
            rules: standard_rules().to_vec(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn views(&self) -> Vec<RuleView> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule.view(index))
            .collect()
    }

    /// Returns the decision of the first rule whose hosting, event and state
    /// predicates all hold, or `None` when no CRM action applies.
    pub fn decide<'a>(
        &self,
        hosting: &str,
        event: EventKind,
        deals: &'a [Deal],
    ) -> Option<Decision<'a>> {
        let category = HostingCategory::classify(hosting);

        self.rules
            .iter()
            .enumerate()
            .find_map(|(index, rule)| {
                rule.matches(category, event, deals)
                    .map(|matched| Decision {
                        rule_index: index,
                        outcome: rule.outcome,
                        representative: matched.representative,
                    })
            })
    }
}

impl Default for DecisionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

const SERVER: HostingPredicate = HostingPredicate::Is(HostingCategory::Server);
const DATA_CENTER: HostingPredicate = HostingPredicate::Is(HostingCategory::DataCenter);
const CLOUD: HostingPredicate = HostingPredicate::Is(HostingCategory::Cloud);

const CREATE_TRIAL: Outcome = Outcome::Create {
    stage: DealStage::Eval,
};
const CREATE_WON: Outcome = Outcome::Create {
    stage: DealStage::ClosedWon,
};
const CLOSE_WON: Outcome = Outcome::Close {
    stage: DealStage::ClosedWon,
};
const CLOSE_LOST: Outcome = Outcome::Close {
    stage: DealStage::ClosedLost,
};

// Order is significant. Cloud lists purchase-with-trial ahead of
// purchase-with-nothing; the refund catch-all must stay last.
fn standard_rules() -> [Rule; 19] {
    use EventPredicate::{NewTrial, Purchase, Refund, Renewal, Upgrade};
    use StatePredicate::{Any, HasNonLost, HasNothing, HasTrial};

    [
        Rule::new(SERVER, NewTrial, HasNothing, CREATE_TRIAL),
        Rule::new(SERVER, NewTrial, HasTrial, Outcome::Update),
        Rule::new(SERVER, Purchase, HasNothing, CREATE_WON),
        Rule::new(SERVER, Purchase, HasTrial, CLOSE_WON),
        Rule::new(SERVER, Renewal, Any, CREATE_WON),
        Rule::new(SERVER, Upgrade, Any, CREATE_WON),
        Rule::new(DATA_CENTER, NewTrial, HasNothing, CREATE_TRIAL),
        Rule::new(DATA_CENTER, NewTrial, HasTrial, Outcome::Update),
        Rule::new(DATA_CENTER, Purchase, HasNothing, CREATE_WON),
        Rule::new(DATA_CENTER, Purchase, HasTrial, CLOSE_WON),
        Rule::new(DATA_CENTER, Renewal, Any, CREATE_WON),
        Rule::new(DATA_CENTER, Upgrade, Any, CREATE_WON),
        Rule::new(CLOUD, NewTrial, HasNothing, CREATE_TRIAL),
        Rule::new(CLOUD, NewTrial, HasTrial, Outcome::Update),
        Rule::new(CLOUD, Purchase, HasTrial, CLOSE_WON),
        Rule::new(CLOUD, Purchase, HasNothing, CREATE_WON),
        Rule::new(CLOUD, Renewal, Any, CREATE_WON),
        Rule::new(CLOUD, Upgrade, Any, CREATE_WON),
        Rule::new(HostingPredicate::Any, Refund, HasNonLost, CLOSE_LOST),
    ]
}
