use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{Deal, DealRelevantEvent, EventKind, License, LicenseId};
use super::service::{DecisionAction, DecisionRecord};

/// One row of the deal-relevant event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub license: License,
    pub event: DealRelevantEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedImportError {
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid feed CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid deal snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: unknown event kind '{value}'")]
    InvalidEvent { line: u64, value: String },
    #[error("line {line}: unparseable date '{value}'")]
    InvalidDate { line: u64, value: String },
}

pub fn load_feed<P: AsRef<Path>>(path: P) -> Result<Vec<FeedEntry>, FeedImportError> {
    let file = std::fs::File::open(path)?;
    parse_feed(file)
}

/// Parses the event feed CSV (`License ID`, `Hosting`, `Event`, `Date`,
/// optional `Transaction ID`).
///
/// A transaction id binds the deal that event closes or creates. Later events
/// carrying a different id do not see that deal once it is closed, while open
/// trial deals stay visible to every event. A refund whose id matches no
/// closed deal is decided against all of the license's deals. Errors report
/// the line a row starts on.
pub fn parse_feed<R: Read>(reader: R) -> Result<Vec<FeedEntry>, FeedImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut entries = Vec::new();

    while csv_reader.read_record(&mut record)? {
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();
        let row: FeedRow = record.deserialize(Some(&headers))?;

        let kind = EventKind::parse(&row.event).ok_or_else(|| FeedImportError::InvalidEvent {
            line,
            value: row.event.clone(),
        })?;
        let occurred_on = parse_date(&row.date).ok_or_else(|| FeedImportError::InvalidDate {
            line,
            value: row.date.clone(),
        })?;

        entries.push(FeedEntry {
            license: License {
                id: LicenseId(row.license_id.clone()),
                hosting: row.hosting,
            },
            event: DealRelevantEvent {
                kind,
                license_id: LicenseId(row.license_id),
                occurred_on,
                transaction_id: row.transaction_id,
            },
        });
    }

    Ok(entries)
}

pub fn load_deals<P: AsRef<Path>>(path: P) -> Result<Vec<Deal>, FeedImportError> {
    let file = std::fs::File::open(path)?;
    parse_deals(file)
}

/// Reads a JSON array of deals used to seed the CRM stand-in.
pub fn parse_deals<R: Read>(reader: R) -> Result<Vec<Deal>, FeedImportError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Writes one CSV row per decision.
pub fn write_decisions<W: Write>(
    writer: W,
    records: &[DecisionRecord],
) -> Result<(), FeedImportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(DecisionRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(rename = "License ID")]
    license_id: String,
    #[serde(rename = "Hosting")]
    hosting: String,
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(
        rename = "Transaction ID",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct DecisionRow<'a> {
    #[serde(rename = "License ID")]
    license_id: &'a str,
    #[serde(rename = "Event")]
    event: &'static str,
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Rule")]
    rule: Option<usize>,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Deal ID")]
    deal_id: Option<&'a str>,
}

impl<'a> From<&'a DecisionRecord> for DecisionRow<'a> {
    fn from(record: &'a DecisionRecord) -> Self {
        let (rule, action, deal_id) = match &record.action {
            DecisionAction::NoMatch => (None, "no match".to_string(), None),
            DecisionAction::Applied {
                rule_index,
                mutation,
                deal_id,
            } => (Some(*rule_index), mutation.to_string(), Some(deal_id.0.as_str())),
        };

        Self {
            license_id: &record.license_id.0,
            event: record.event.kind.label(),
            date: record.event.occurred_on,
            rule,
            action,
            deal_id,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc().date())
}
