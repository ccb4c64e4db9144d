use std::collections::HashMap;

use super::records::MarketplaceRecord;

/// Map keyed by every identifier a record carries, so a record is found
/// again when any one of its ids survives between snapshots.
#[derive(Debug, Clone)]
pub struct RecordIndex<V> {
    slots: Vec<Slot<V>>,
    keys: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Slot<V> {
    id: String,
    value: V,
}

impl<V> Default for RecordIndex<V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            keys: HashMap::new(),
        }
    }
}

impl<V> RecordIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` for the record, replacing the value of any slot that
    /// already shares a key. Returns `false` for records without identifiers.
    pub fn insert<R: MarketplaceRecord>(&mut self, record: &R, value: V) -> bool {
        let keys = record.keys();
        if keys.is_empty() {
            return false;
        }

        let existing = keys.iter().find_map(|key| self.keys.get(key).copied());
        let slot = match existing {
            Some(slot) => {
                self.slots[slot].value = value;
                slot
            }
            None => {
                self.slots.push(Slot {
                    id: record.display_id(),
                    value,
                });
                self.slots.len() - 1
            }
        };

        for key in keys {
            self.keys.insert(key, slot);
        }
        true
    }

    pub fn get<R: MarketplaceRecord>(&self, record: &R) -> Option<&V> {
        record
            .keys()
            .iter()
            .find_map(|key| self.keys.get(key))
            .map(|&slot| &self.slots[slot].value)
    }

    pub fn contains<R: MarketplaceRecord>(&self, record: &R) -> bool {
        self.get(record).is_some()
    }

    /// Entries in first-insertion order, labelled with the id of the record
    /// that opened the slot.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots
            .iter()
            .map(|slot| (slot.id.as_str(), &slot.value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_shift::records::{LicenseIds, LicenseRecord};

    fn license(addon: Option<&str>, entitlement: Option<&str>) -> LicenseRecord {
        LicenseRecord {
            ids: LicenseIds {
                addon_license_id: addon.map(str::to_string),
                app_entitlement_id: None,
                app_entitlement_number: entitlement.map(str::to_string),
            },
            addon_key: "com.example.app".to_string(),
            addon_name: "Example".to_string(),
            hosting: "Server".to_string(),
            maintenance_start_date: None,
        }
    }

    #[test]
    fn record_is_found_through_any_shared_identifier() {
        let mut index = RecordIndex::new();
        index.insert(&license(Some("SEN-1"), None), 1);

        assert_eq!(index.get(&license(Some("SEN-1"), Some("E-1"))), Some(&1));

        index.insert(&license(Some("SEN-1"), Some("E-1")), 2);
        assert_eq!(index.get(&license(None, Some("E-1"))), Some(&2));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn records_without_identifiers_are_not_indexed() {
        let mut index = RecordIndex::new();

        assert!(!index.insert(&license(None, None), ()));
        assert!(index.is_empty());
        assert!(!index.contains(&license(None, None)));
    }
}
