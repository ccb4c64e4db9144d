use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::classify::HostingCategory;

/// Marketplace identifier for a license (the addon license id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(pub String);

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// CRM identifier for a deal record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(pub String);

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle position of a CRM deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStage {
    Eval,
    Pending,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eval => "EVAL",
            Self::Pending => "PENDING",
            Self::ClosedWon => "CLOSED_WON",
            Self::ClosedLost => "CLOSED_LOST",
        }
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// CRM-side properties the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealProperties {
    pub dealstage: DealStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closedate: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_touched: Option<NaiveDate>,
    /// Marketplace transaction the deal was won or lost on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// A CRM sales opportunity tied to exactly one license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub license_id: LicenseId,
    pub properties: DealProperties,
}

impl Deal {
    pub fn new(id: impl Into<String>, license_id: impl Into<String>, stage: DealStage) -> Self {
        Self {
            id: DealId(id.into()),
            license_id: LicenseId(license_id.into()),
            properties: DealProperties {
                dealstage: stage,
                closedate: None,
                last_touched: None,
                transaction_id: None,
            },
        }
    }

    pub fn stage(&self) -> DealStage {
        self.properties.dealstage
    }

    /// Whether the deal belongs in the deal set an event is decided against.
    ///
    /// Open deals are always visible. A closed deal bound to a transaction is
    /// hidden from events carrying a different transaction id, so a second
    /// purchase opens its own deal instead of colliding with the first.
    pub fn relevant_to(&self, event: &DealRelevantEvent) -> bool {
        match (&event.transaction_id, &self.properties.transaction_id) {
            (Some(event_txn), Some(deal_txn)) if self.stage().is_closed() => {
                event_txn == deal_txn
            }
            _ => true,
        }
    }
}

/// Marketplace entitlement as observed in the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub hosting: String,
}

impl License {
    pub fn new(id: impl Into<String>, hosting: impl Into<String>) -> Self {
        Self {
            id: LicenseId(id.into()),
            hosting: hosting.into(),
        }
    }

    pub fn hosting_category(&self) -> Option<HostingCategory> {
        HostingCategory::classify(&self.hosting)
    }
}

/// Kind of deal-relevant occurrence derived from license and transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Eval,
    Purchase,
    Renewal,
    Upgrade,
    Refund,
}

impl EventKind {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Eval,
            Self::Purchase,
            Self::Renewal,
            Self::Upgrade,
            Self::Refund,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eval" => Some(Self::Eval),
            "purchase" => Some(Self::Purchase),
            "renewal" => Some(Self::Renewal),
            "upgrade" => Some(Self::Upgrade),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Eval => "eval",
            Self::Purchase => "purchase",
            Self::Renewal => "renewal",
            Self::Upgrade => "upgrade",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified event for one license, consumed once by the decision matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRelevantEvent {
    pub kind: EventKind,
    pub license_id: LicenseId,
    pub occurred_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl DealRelevantEvent {
    pub fn new(kind: EventKind, license_id: impl Into<String>, occurred_on: NaiveDate) -> Self {
        Self {
            kind,
            license_id: LicenseId(license_id.into()),
            occurred_on,
            transaction_id: None,
        }
    }
}
