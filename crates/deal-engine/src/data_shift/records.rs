use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which marketplace collection a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    License,
    Transaction,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field name paired with its rendered value, compared between sightings.
pub type AuditedField = (&'static str, Option<String>);

/// Shared identity and audit surface for marketplace records.
pub trait MarketplaceRecord {
    const KIND: RecordKind;

    /// Every key the record can be recognized by. Two records are the same
    /// record when any key is shared.
    fn keys(&self) -> Vec<String>;

    /// Human readable id used in findings and logs.
    fn display_id(&self) -> String;

    fn audited_fields(&self) -> Vec<AuditedField>;
}

/// License identifiers as published by the marketplace. Older licenses only
/// carry an addon license id; newer ones add the app entitlement pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseIds {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub addon_license_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub app_entitlement_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub app_entitlement_number: Option<String>,
}

impl LicenseIds {
    fn keys(&self) -> Vec<String> {
        [
            ("addon-license", &self.addon_license_id),
            ("entitlement-id", &self.app_entitlement_id),
            ("entitlement-number", &self.app_entitlement_number),
        ]
        .into_iter()
        .filter_map(|(prefix, id)| id.as_ref().map(|id| format!("{prefix}:{id}")))
        .collect()
    }

    fn primary(&self) -> Option<&str> {
        self.addon_license_id
            .as_deref()
            .or(self.app_entitlement_number.as_deref())
            .or(self.app_entitlement_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    #[serde(flatten)]
    pub ids: LicenseIds,
    #[serde(default)]
    pub addon_key: String,
    #[serde(default)]
    pub addon_name: String,
    #[serde(default)]
    pub hosting: String,
    #[serde(default)]
    pub maintenance_start_date: Option<NaiveDate>,
}

impl MarketplaceRecord for LicenseRecord {
    const KIND: RecordKind = RecordKind::License;

    fn keys(&self) -> Vec<String> {
        self.ids.keys()
    }

    fn display_id(&self) -> String {
        self.ids.primary().unwrap_or("<unidentified>").to_string()
    }

    fn audited_fields(&self) -> Vec<AuditedField> {
        vec![
            ("addonKey", Some(self.addon_key.clone())),
            ("addonName", Some(self.addon_name.clone())),
            ("hosting", Some(self.hosting.clone())),
            (
                "maintenanceStartDate",
                self.maintenance_start_date.map(|date| date.to_string()),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub transaction_line_item_id: Option<String>,
    #[serde(flatten)]
    pub ids: LicenseIds,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub sale_type: String,
    #[serde(default)]
    pub addon_key: String,
    #[serde(default)]
    pub addon_name: String,
    #[serde(default)]
    pub hosting: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub purchase_price: f64,
    #[serde(default)]
    pub vendor_amount: f64,
    #[serde(default)]
    pub billing_period: String,
    #[serde(default)]
    pub maintenance_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub maintenance_end_date: Option<NaiveDate>,
}

impl TransactionRecord {
    fn transaction_key(&self) -> String {
        match &self.transaction_line_item_id {
            Some(line) => format!("{}[{line}]", self.transaction_id),
            None => self.transaction_id.clone(),
        }
    }
}

impl MarketplaceRecord for TransactionRecord {
    const KIND: RecordKind = RecordKind::Transaction;

    // A transaction id alone is reused across the licenses on one invoice, so
    // every key also carries a license identifier.
    fn keys(&self) -> Vec<String> {
        let transaction = self.transaction_key();
        self.ids
            .keys()
            .into_iter()
            .map(|license_key| format!("{transaction}/{license_key}"))
            .collect()
    }

    fn display_id(&self) -> String {
        match self.ids.primary() {
            Some(license) => format!("{}/{license}", self.transaction_key()),
            None => self.transaction_key(),
        }
    }

    fn audited_fields(&self) -> Vec<AuditedField> {
        vec![
            ("saleDate", Some(self.sale_date.to_string())),
            ("saleType", Some(self.sale_type.clone())),
            ("addonKey", Some(self.addon_key.clone())),
            ("addonName", Some(self.addon_name.clone())),
            ("hosting", Some(self.hosting.clone())),
            ("country", Some(self.country.clone())),
            ("region", Some(self.region.clone())),
            ("purchasePrice", Some(self.purchase_price.to_string())),
            ("vendorAmount", Some(self.vendor_amount.to_string())),
            ("billingPeriod", Some(self.billing_period.clone())),
            (
                "maintenanceStartDate",
                self.maintenance_start_date.map(|date| date.to_string()),
            ),
            (
                "maintenanceEndDate",
                self.maintenance_end_date.map(|date| date.to_string()),
            ),
        ]
    }
}

/// One marketplace download, stamped with the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub licenses: Vec<LicenseRecord>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<DataSet, SnapshotError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads every snapshot, failing on the first unreadable file.
pub fn load_snapshots<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<DataSet>, SnapshotError> {
    paths.iter().map(load_snapshot).collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}
