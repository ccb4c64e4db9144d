use super::common::*;
use crate::deals::apply::DealMutation;
use crate::deals::domain::{Deal, DealId, DealStage, EventKind, License, LicenseId};
use crate::deals::feed::FeedEntry;
use crate::deals::gateway::{GatewayError, InMemoryDealGateway};
use crate::deals::matrix::{DecisionError, DecisionMatrix, Outcome, Rule};
use crate::deals::service::{DealDecisionService, DealServiceError, DecisionAction, DecisionRecord};
use crate::deals::classify::{EventPredicate, HostingPredicate};
use crate::deals::state::StatePredicate;
use std::sync::Arc;

fn applied_deal(record: &DecisionRecord) -> DealId {
    match &record.action {
        DecisionAction::Applied { deal_id, .. } => deal_id.clone(),
        other => panic!("expected an applied mutation, got {other:?}"),
    }
}

#[test]
fn trial_then_purchase_closes_the_trial_created_earlier() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(
            &license("Server"),
            vec![
                transaction_event(EventKind::Purchase, 10, "AT-1"),
                event(EventKind::Eval, 2),
            ],
        )
        .expect("events apply");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event.kind, EventKind::Eval, "sorted by date");
    let trial_id = match &records[0].action {
        DecisionAction::Applied {
            rule_index: 0,
            deal_id,
            ..
        } => deal_id.clone(),
        other => panic!("expected trial creation, got {other:?}"),
    };
    assert_eq!(
        records[1].mutation(),
        Some(&DealMutation::Close {
            deal_id: trial_id.clone(),
            stage: DealStage::ClosedWon,
        })
    );

    let deals = license_deals(&gateway);
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].id, trial_id);
    assert_eq!(deals[0].stage(), DealStage::ClosedWon);
    assert_eq!(deals[0].properties.closedate, Some(day(10)));
    assert_eq!(deals[0].properties.transaction_id.as_deref(), Some("AT-1"));
}

#[test]
fn repeat_purchase_creates_a_second_won_deal() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(
            &license("Data Center"),
            vec![
                event(EventKind::Eval, 1),
                transaction_event(EventKind::Purchase, 5, "AT-1"),
                transaction_event(EventKind::Purchase, 20, "AT-2"),
            ],
        )
        .expect("events apply");

    assert!(matches!(
        records[2].mutation(),
        Some(DealMutation::Create {
            stage: DealStage::ClosedWon,
            ..
        })
    ));

    let deals = license_deals(&gateway);
    assert_eq!(deals.len(), 2);
    assert!(deals.iter().all(|deal| deal.stage() == DealStage::ClosedWon));
    assert_eq!(deals[1].properties.transaction_id.as_deref(), Some("AT-2"));
}

#[test]
fn replaying_the_same_purchase_does_not_close_again() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());
    let purchase = transaction_event(EventKind::Purchase, 5, "AT-1");

    service
        .process_license(
            &license("Server"),
            vec![event(EventKind::Eval, 1), purchase.clone()],
        )
        .expect("first pass applies");
    let before = license_deals(&gateway);

    let replay = service
        .process_license(&license("Server"), vec![purchase])
        .expect("replay evaluates");

    assert_eq!(replay[0].action, DecisionAction::NoMatch);
    assert_eq!(license_deals(&gateway), before);
}

#[test]
fn second_trial_touches_existing_trial_instead_of_duplicating() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(
            &license("Cloud"),
            vec![event(EventKind::Eval, 1), event(EventKind::Eval, 8)],
        )
        .expect("events apply");

    assert!(matches!(
        records[1].mutation(),
        Some(DealMutation::Update { .. })
    ));
    let deals = license_deals(&gateway);
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].stage(), DealStage::Eval);
    assert_eq!(deals[0].properties.last_touched, Some(day(8)));
}

#[test]
fn refund_closes_the_deal_won_on_the_refunded_transaction() {
    let mut first = Deal::new("won-1", "SEN-100", DealStage::ClosedWon);
    first.properties.transaction_id = Some("AT-1".to_string());
    let mut second = Deal::new("won-2", "SEN-100", DealStage::ClosedWon);
    second.properties.transaction_id = Some("AT-2".to_string());
    let (service, gateway) = service_with(InMemoryDealGateway::with_deals(vec![first, second]));

    let records = service
        .process_license(
            &license("Server"),
            vec![transaction_event(EventKind::Refund, 12, "AT-2")],
        )
        .expect("refund applies");

    assert_eq!(
        records[0].mutation(),
        Some(&DealMutation::Close {
            deal_id: DealId("won-2".to_string()),
            stage: DealStage::ClosedLost,
        })
    );
    let deals = license_deals(&gateway);
    assert_eq!(deals[0].stage(), DealStage::ClosedWon);
    assert_eq!(deals[1].stage(), DealStage::ClosedLost);
}

#[test]
fn purchase_closes_a_trial_bound_to_another_transaction() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(
            &license("Server"),
            vec![
                transaction_event(EventKind::Eval, 1, "AT-EVAL"),
                transaction_event(EventKind::Purchase, 5, "AT-1"),
            ],
        )
        .expect("events apply");

    let trial_id = applied_deal(&records[0]);
    assert_eq!(
        records[1].mutation(),
        Some(&DealMutation::Close {
            deal_id: trial_id.clone(),
            stage: DealStage::ClosedWon,
        })
    );

    let deals = license_deals(&gateway);
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].id, trial_id);
    assert_eq!(deals[0].stage(), DealStage::ClosedWon);
    assert_eq!(deals[0].properties.transaction_id.as_deref(), Some("AT-1"));
}

#[test]
fn refund_with_its_own_transaction_closes_the_won_deal() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(
            &license("Cloud"),
            vec![
                transaction_event(EventKind::Purchase, 5, "AT-1"),
                transaction_event(EventKind::Refund, 9, "AT-R"),
            ],
        )
        .expect("events apply");

    let won_id = applied_deal(&records[0]);
    assert_eq!(
        records[1].mutation(),
        Some(&DealMutation::Close {
            deal_id: won_id,
            stage: DealStage::ClosedLost,
        })
    );
    let deals = license_deals(&gateway);
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].stage(), DealStage::ClosedLost);

    let replay = service
        .process_license(
            &license("Cloud"),
            vec![
                transaction_event(EventKind::Purchase, 5, "AT-1"),
                transaction_event(EventKind::Refund, 9, "AT-R"),
            ],
        )
        .expect("replay evaluates");

    assert!(replay
        .iter()
        .all(|record| record.action == DecisionAction::NoMatch));
    assert_eq!(license_deals(&gateway), deals);
}

#[test]
fn unmatched_events_are_recorded_without_mutation() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());

    let records = service
        .process_license(&license("Server"), vec![event(EventKind::Refund, 3)])
        .expect("evaluates");

    assert_eq!(records[0].action, DecisionAction::NoMatch);
    assert!(license_deals(&gateway).is_empty());
}

#[test]
fn events_for_other_licenses_are_skipped() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());
    let mut stray = event(EventKind::Eval, 1);
    stray.license_id = LicenseId("SEN-999".to_string());

    let records = service
        .process_license(&license("Server"), vec![stray])
        .expect("evaluates");

    assert!(records.is_empty());
    assert!(gateway.snapshot().expect("snapshot").is_empty());
}

#[test]
fn malformed_outcome_stops_processing_before_any_mutation() {
    let matrix = DecisionMatrix::new(vec![Rule::new(
        HostingPredicate::Any,
        EventPredicate::NewTrial,
        StatePredicate::Any,
        Outcome::Close {
            stage: DealStage::ClosedWon,
        },
    )])
    .expect("statically acceptable");
    let gateway = Arc::new(InMemoryDealGateway::default());
    let service = DealDecisionService::new(Arc::new(matrix), gateway.clone());

    let result = service.process_license(
        &license("Server"),
        vec![event(EventKind::Eval, 1), event(EventKind::Eval, 2)],
    );

    match result {
        Err(DealServiceError::Decision(DecisionError::MalformedRuleOutcome { rule: 0, .. })) => {}
        other => panic!("expected malformed outcome, got {other:?}"),
    }
    assert!(gateway.snapshot().expect("snapshot").is_empty());
}

#[test]
fn gateway_failures_propagate() {
    let service = DealDecisionService::new(Arc::new(matrix()), Arc::new(OfflineGateway));

    match service.process_license(&license("Server"), vec![event(EventKind::Eval, 1)]) {
        Err(DealServiceError::Gateway(GatewayError::Unavailable(reason))) => {
            assert!(reason.contains("offline"));
        }
        other => panic!("expected gateway error, got {other:?}"),
    }
}

#[test]
fn feed_processing_keeps_licenses_independent() {
    let (service, gateway) = service_with(InMemoryDealGateway::default());
    let other = License::new("SEN-200", "Cloud");
    let mut other_trial = event(EventKind::Eval, 2);
    other_trial.license_id = other.id.clone();

    let entries = vec![
        FeedEntry {
            license: license("Server"),
            event: event(EventKind::Eval, 1),
        },
        FeedEntry {
            license: other.clone(),
            event: other_trial,
        },
        FeedEntry {
            license: license("Server"),
            event: transaction_event(EventKind::Purchase, 4, "AT-9"),
        },
    ];

    let records = service.process_feed(entries).expect("feed applies");

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].license_id, LicenseId("SEN-100".to_string()));
    assert_eq!(records[1].license_id, LicenseId("SEN-100".to_string()));
    assert_eq!(records[2].license_id, other.id);

    let stages: Vec<DealStage> = gateway
        .snapshot()
        .expect("snapshot")
        .iter()
        .map(Deal::stage)
        .collect();
    assert_eq!(stages, vec![DealStage::ClosedWon, DealStage::Eval]);
}
