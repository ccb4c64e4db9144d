//! Marketplace event to CRM deal decisions.
//!
//! Each deal-relevant event is classified together with the license's hosting
//! type and matched against the ordered [`DecisionMatrix`]. The first matching
//! rule yields an [`Outcome`], which is resolved into a [`DealMutation`] and
//! applied through a [`DealGateway`].

pub mod apply;
pub mod classify;
pub mod domain;
pub mod feed;
pub mod gateway;
pub mod matrix;
pub mod router;
pub mod service;
pub mod state;

#[cfg(test)]
mod tests;

pub use apply::{apply_mutation, DealMutation};
pub use classify::{EventPredicate, HostingCategory, HostingPredicate};
pub use domain::{
    Deal, DealId, DealProperties, DealRelevantEvent, DealStage, EventKind, License, LicenseId,
};
pub use feed::{FeedEntry, FeedImportError};
pub use gateway::{DealGateway, GatewayError, InMemoryDealGateway};
pub use matrix::{Decision, DecisionError, DecisionMatrix, Outcome, Rule, RuleView};
pub use router::deal_router;
pub use service::{DealDecisionService, DealServiceError, DecisionAction, DecisionRecord};
pub use state::{StateMatch, StatePredicate};
