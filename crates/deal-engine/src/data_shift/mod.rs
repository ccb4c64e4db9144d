//! Read-only audit across successive marketplace snapshots.
//!
//! Snapshots are compared in ascending timestamp order to surface records
//! that disappeared, transactions that showed up long after their sale date,
//! and fields the marketplace rewrote after first publishing them. The audit
//! shares no state with the deal decision engine.

pub mod index;
pub mod records;

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AuditConfig;
use index::RecordIndex;
use records::MarketplaceRecord;

pub use records::{
    load_snapshot, load_snapshots, DataSet, LicenseIds, LicenseRecord, RecordKind,
    SnapshotError, TransactionRecord,
};

/// Anomaly found while comparing snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataShiftFinding {
    RecordMissing {
        record: RecordKind,
        id: String,
        checked_at: DateTime<Utc>,
    },
    LateTransaction {
        id: String,
        sale_date: NaiveDate,
        found_at: DateTime<Utc>,
        days_late: i64,
    },
    AlteredRecord {
        record: RecordKind,
        id: String,
        field: &'static str,
        previous: Option<String>,
        current: Option<String>,
    },
}

impl fmt::Display for DataShiftFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordMissing {
                record,
                id,
                checked_at,
            } => write!(f, "{record} {id} went missing as of {checked_at}"),
            Self::LateTransaction {
                id,
                sale_date,
                found_at,
                days_late,
            } => write!(
                f,
                "transaction {id} sold {sale_date} first appeared {found_at} ({days_late} days later)"
            ),
            Self::AlteredRecord {
                record,
                id,
                field,
                previous,
                current,
            } => write!(
                f,
                "{record} {id} changed {field} from {} to {}",
                previous.as_deref().unwrap_or("<empty>"),
                current.as_deref().unwrap_or("<empty>")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShiftAnalyzer {
    late_transaction_threshold_days: i64,
}

impl Default for DataShiftAnalyzer {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

impl DataShiftAnalyzer {
    pub fn new(late_transaction_threshold_days: i64) -> Self {
        Self {
            late_transaction_threshold_days,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.late_transaction_threshold_days)
    }

    pub fn late_transaction_threshold_days(&self) -> i64 {
        self.late_transaction_threshold_days
    }

    /// Runs every check over the snapshots. Input order does not matter; the
    /// snapshots are sorted by timestamp first.
    pub fn run(&self, data_sets: &[DataSet]) -> Vec<DataShiftFinding> {
        let mut ascending: Vec<&DataSet> = data_sets.iter().collect();
        ascending.sort_by_key(|data_set| data_set.timestamp);

        let mut findings = Vec::new();
        if ascending.len() < 2 {
            info!(
                snapshots = ascending.len(),
                "data shift audit needs at least two snapshots"
            );
            return findings;
        }

        findings.extend(check_deleted(&ascending, |ds| ds.licenses.as_slice()));
        findings.extend(check_deleted(&ascending, |ds| ds.transactions.as_slice()));
        findings.extend(self.check_late_transactions(&ascending));
        findings.extend(check_altered(&ascending, |ds| ds.transactions.as_slice()));
        findings.extend(check_altered(&ascending, |ds| ds.licenses.as_slice()));

        info!(
            snapshots = ascending.len(),
            findings = findings.len(),
            "data shift audit finished"
        );
        findings
    }

    fn check_late_transactions(&self, ascending: &[&DataSet]) -> Vec<DataShiftFinding> {
        info!("checking for late transactions");
        let mut first_seen = RecordIndex::new();

        // Walk newest to oldest so each slot ends on its earliest sighting.
        for data_set in ascending.iter().rev() {
            for transaction in &data_set.transactions {
                if !first_seen.insert(transaction, (transaction, data_set.timestamp)) {
                    warn!(
                        record = %RecordKind::Transaction,
                        snapshot = %data_set.timestamp,
                        "skipping record without identifiers"
                    );
                }
            }
        }

        let Some(earliest) = ascending.first().map(|data_set| data_set.timestamp) else {
            return Vec::new();
        };
        let threshold = Duration::days(self.late_transaction_threshold_days);
        let mut findings = Vec::new();

        for (id, (transaction, found_at)) in first_seen.entries() {
            if *found_at == earliest {
                continue;
            }

            let sale_start = transaction.sale_date.and_time(chrono::NaiveTime::MIN).and_utc();
            let delay = *found_at - sale_start;
            if delay > threshold {
                let finding = DataShiftFinding::LateTransaction {
                    id: id.to_string(),
                    sale_date: transaction.sale_date,
                    found_at: *found_at,
                    days_late: delay.num_days(),
                };
                error!(
                    id,
                    expected = %transaction.sale_date,
                    found = %found_at,
                    "transaction is far off"
                );
                findings.push(finding);
            }
        }

        findings
    }
}

fn check_deleted<'a, R, F>(ascending: &[&'a DataSet], records_of: F) -> Vec<DataShiftFinding>
where
    R: MarketplaceRecord + 'a,
    F: Fn(&'a DataSet) -> &'a [R],
{
    info!(record = %R::KIND, "checking for deleted records");
    let mut findings = Vec::new();
    let Some((first, rest)) = ascending.split_first() else {
        return findings;
    };

    let mut previous = index_records(records_of(*first));
    for data_set in rest {
        let current = index_records(records_of(*data_set));
        for (id, record) in previous.entries() {
            if !current.contains(*record) {
                warn!(
                    record = %R::KIND,
                    id,
                    checked_at = %data_set.timestamp,
                    "record went missing"
                );
                findings.push(DataShiftFinding::RecordMissing {
                    record: R::KIND,
                    id: id.to_string(),
                    checked_at: data_set.timestamp,
                });
            }
        }
        previous = current;
    }

    findings
}

fn check_altered<'a, R, F>(ascending: &[&'a DataSet], records_of: F) -> Vec<DataShiftFinding>
where
    R: MarketplaceRecord + 'a,
    F: Fn(&'a DataSet) -> &'a [R],
{
    info!(record = %R::KIND, "checking for altered record data");
    let mut last_seen: RecordIndex<Vec<records::AuditedField>> = RecordIndex::new();
    let mut findings = Vec::new();

    for data_set in ascending {
        for record in records_of(*data_set) {
            let fields = record.audited_fields();
            if let Some(previous) = last_seen.get(record) {
                for ((field, current), (_, last)) in fields.iter().zip(previous) {
                    if current != last {
                        let id = record.display_id();
                        error!(
                            record = %R::KIND,
                            id = %id,
                            field,
                            previous = ?last,
                            current = ?current,
                            "altered record data"
                        );
                        findings.push(DataShiftFinding::AlteredRecord {
                            record: R::KIND,
                            id,
                            field: *field,
                            previous: last.clone(),
                            current: current.clone(),
                        });
                    }
                }
            }
            last_seen.insert(record, fields);
        }
    }

    findings
}

fn index_records<R: MarketplaceRecord>(records: &[R]) -> RecordIndex<&R> {
    let mut index = RecordIndex::new();
    for record in records {
        if !index.insert(record, record) {
            warn!(record = %R::KIND, "skipping record without identifiers");
        }
    }
    index
}
