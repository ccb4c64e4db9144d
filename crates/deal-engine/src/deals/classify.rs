use serde::{Deserialize, Serialize};
use std::fmt;

use super::domain::EventKind;

/// Deployment type of a licensed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingCategory {
    Server,
    DataCenter,
    Cloud,
}

impl HostingCategory {
    /// Maps the marketplace hosting string onto a category.
    ///
    /// Values outside the marketplace vocabulary classify as `None`; they only
    /// satisfy [`HostingPredicate::Any`].
    pub fn classify(hosting: &str) -> Option<Self> {
        match hosting {
            "Server" => Some(Self::Server),
            "Data Center" => Some(Self::DataCenter),
            "Cloud" => Some(Self::Cloud),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Server => "Server",
            Self::DataCenter => "Data Center",
            Self::Cloud => "Cloud",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingPredicate {
    Is(HostingCategory),
    Any,
}

impl HostingPredicate {
    pub fn matches(self, category: Option<HostingCategory>) -> bool {
        match self {
            Self::Is(expected) => category == Some(expected),
            Self::Any => true,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Is(category) => category.label(),
            Self::Any => "any hosting",
        }
    }
}

impl fmt::Display for HostingPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl EventKind {
    pub const fn is_new_trial(self) -> bool {
        matches!(self, Self::Eval)
    }

    pub const fn is_purchase(self) -> bool {
        matches!(self, Self::Purchase)
    }

    pub const fn is_renewal(self) -> bool {
        matches!(self, Self::Renewal)
    }

    pub const fn is_upgrade(self) -> bool {
        matches!(self, Self::Upgrade)
    }

    pub const fn is_refund(self) -> bool {
        matches!(self, Self::Refund)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPredicate {
    NewTrial,
    Purchase,
    Renewal,
    Upgrade,
    Refund,
}

impl EventPredicate {
    pub fn matches(self, kind: EventKind) -> bool {
        match self {
            Self::NewTrial => kind.is_new_trial(),
            Self::Purchase => kind.is_purchase(),
            Self::Renewal => kind.is_renewal(),
            Self::Upgrade => kind.is_upgrade(),
            Self::Refund => kind.is_refund(),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NewTrial => "new trial",
            Self::Purchase => "purchase",
            Self::Renewal => "renewal",
            Self::Upgrade => "upgrade",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for EventPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_marketplace_hosting_values() {
        assert_eq!(
            HostingCategory::classify("Server"),
            Some(HostingCategory::Server)
        );
        assert_eq!(
            HostingCategory::classify("Data Center"),
            Some(HostingCategory::DataCenter)
        );
        assert_eq!(
            HostingCategory::classify("Cloud"),
            Some(HostingCategory::Cloud)
        );
    }

    #[test]
    fn unrecognized_hosting_only_matches_any() {
        let category = HostingCategory::classify("DataCenter");
        assert_eq!(category, None);

        assert!(HostingPredicate::Any.matches(category));
        for specific in [
            HostingCategory::Server,
            HostingCategory::DataCenter,
            HostingCategory::Cloud,
        ] {
            assert!(!HostingPredicate::Is(specific).matches(category));
        }
    }

    #[test]
    fn event_predicates_are_mutually_exclusive() {
        let predicates = [
            EventPredicate::NewTrial,
            EventPredicate::Purchase,
            EventPredicate::Renewal,
            EventPredicate::Upgrade,
            EventPredicate::Refund,
        ];

        for kind in EventKind::ordered() {
            let hits = predicates
                .iter()
                .filter(|predicate| predicate.matches(kind))
                .count();
            assert_eq!(hits, 1, "{kind} should satisfy exactly one predicate");
        }
    }

    #[test]
    fn new_trial_predicate_maps_to_eval_events() {
        assert!(EventPredicate::NewTrial.matches(EventKind::Eval));
        assert!(!EventPredicate::NewTrial.matches(EventKind::Purchase));
    }
}
