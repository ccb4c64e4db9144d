use deal_engine::config::AuditConfig;
use deal_engine::data_shift::{
    load_snapshot, DataSet, DataShiftAnalyzer, DataShiftFinding, RecordKind, SnapshotError,
};

fn snapshot(json: &str) -> DataSet {
    serde_json::from_str(json).expect("snapshot parses")
}

fn march_first() -> DataSet {
    snapshot(
        r#"{
            "timestamp": "2024-03-01T06:00:00Z",
            "licenses": [
                {"addonLicenseId": "SEN-1", "addonKey": "com.example.timesheets",
                 "addonName": "Timesheets", "hosting": "Server",
                 "maintenanceStartDate": "2024-01-01"},
                {"addonLicenseId": "SEN-2", "addonKey": "com.example.timesheets",
                 "addonName": "Timesheets", "hosting": "Cloud"}
            ],
            "transactions": [
                {"transactionId": "AT-1", "addonLicenseId": "SEN-1",
                 "saleDate": "2024-01-01", "saleType": "New", "hosting": "Server",
                 "purchasePrice": 500.0, "vendorAmount": 375.0}
            ]
        }"#,
    )
}

fn april_first() -> DataSet {
    snapshot(
        r#"{
            "timestamp": "2024-04-01T06:00:00Z",
            "licenses": [
                {"addonLicenseId": "SEN-1", "appEntitlementNumber": "E-1",
                 "addonKey": "com.example.timesheets", "addonName": "Timesheets Pro",
                 "hosting": "Server", "maintenanceStartDate": "2024-01-01"}
            ],
            "transactions": [
                {"transactionId": "AT-1", "addonLicenseId": "SEN-1",
                 "saleDate": "2024-01-01", "saleType": "New", "hosting": "Server",
                 "purchasePrice": 500.0, "vendorAmount": 375.0},
                {"transactionId": "AT-2", "appEntitlementNumber": "E-9",
                 "saleDate": "2024-01-15", "saleType": "Renewal", "hosting": "Cloud",
                 "purchasePrice": 80.0, "vendorAmount": 60.0}
            ]
        }"#,
    )
}

#[test]
fn audit_reports_each_kind_of_shift_in_check_order() {
    let findings = DataShiftAnalyzer::default().run(&[april_first(), march_first()]);

    assert_eq!(findings.len(), 3, "{findings:?}");
    assert!(matches!(
        &findings[0],
        DataShiftFinding::RecordMissing { record: RecordKind::License, id, .. } if id == "SEN-2"
    ));
    assert!(matches!(
        &findings[1],
        DataShiftFinding::LateTransaction { id, days_late, .. }
            if id == "AT-2/E-9" && *days_late == 77
    ));
    assert!(matches!(
        &findings[2],
        DataShiftFinding::AlteredRecord { record: RecordKind::License, field: "addonName", .. }
    ));
}

#[test]
fn raising_the_threshold_silences_late_transactions() {
    let analyzer = DataShiftAnalyzer::from_config(&AuditConfig {
        late_transaction_threshold_days: 90,
    });

    let findings = analyzer.run(&[march_first(), april_first()]);

    assert!(findings
        .iter()
        .all(|finding| !matches!(finding, DataShiftFinding::LateTransaction { .. })));
}

#[test]
fn missing_snapshot_file_names_the_path() {
    match load_snapshot("does-not-exist/snapshot.json") {
        Err(error @ SnapshotError::Io { .. }) => {
            assert!(error.to_string().contains("does-not-exist/snapshot.json"));
        }
        other => panic!("expected io error, got {other:?}"),
    }
}
