//! Record deduplication and merging.
//!
//! Records describing the same physical store share a [`DedupKey`]. The key
//! comes from the case-folded, whitespace-collapsed `name` and `address`
//! fields; records missing either fall back to a hash of their site-defined
//! fields. The key scheme is public so downstream cross-site matching can
//! reuse it.

use indexmap::map::Entry;
use indexmap::IndexMap;
use petlead_core::{is_blank, StoreRecord};
use sha2::{Digest, Sha256};

const NAME_FIELD: &str = "name";
const ADDRESS_FIELD: &str = "address";

/// Identity of a physical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    /// SHA-256 over the normalized name and address.
    NameAddress(String),
    /// SHA-256 over every non-blank site-defined field, sorted by key.
    Content(String),
}

impl DedupKey {
    #[must_use]
    pub fn for_record(record: &StoreRecord) -> Self {
        match (record.non_empty(NAME_FIELD), record.non_empty(ADDRESS_FIELD)) {
            (Some(name), Some(address)) => {
                let input = format!(
                    "{}\x00{}",
                    normalize_identity(name),
                    normalize_identity(address)
                );
                DedupKey::NameAddress(hex_digest(&input))
            }
            _ => {
                let mut fields: Vec<(&String, &String)> = record
                    .fields()
                    .iter()
                    .filter(|(_, v)| !is_blank(v))
                    .collect();
                fields.sort();
                let mut input = String::new();
                for (key, value) in fields {
                    input.push_str(key);
                    input.push('\x00');
                    input.push_str(value.trim());
                    input.push('\x00');
                }
                DedupKey::Content(hex_digest(&input))
            }
        }
    }

    /// Hex digest without the kind.
    #[must_use]
    pub fn digest(&self) -> &str {
        match self {
            DedupKey::NameAddress(d) | DedupKey::Content(d) => d,
        }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupKey::NameAddress(d) => write!(f, "na:{d}"),
            DedupKey::Content(d) => write!(f, "raw:{d}"),
        }
    }
}

/// Case-fold and collapse runs of whitespace to a single space.
#[must_use]
pub fn normalize_identity(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// What happened to a record pushed into a [`RecordDeduplicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Merged,
}

/// Keeps the most complete record per [`DedupKey`] for one site job.
#[derive(Debug, Default)]
pub struct RecordDeduplicator {
    entries: IndexMap<DedupKey, StoreRecord>,
    received: usize,
    merged: usize,
}

impl RecordDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record, merging it into an existing one with the same key.
    ///
    /// Whitespace-only values are stored as `""`.
    pub fn push(&mut self, mut record: StoreRecord) -> Admission {
        self.received += 1;
        clear_blanks(&mut record);
        match self.entries.entry(DedupKey::for_record(&record)) {
            Entry::Occupied(mut existing) => {
                merge_into(existing.get_mut(), &record);
                self.merged += 1;
                Admission::Merged
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Admission::New
            }
        }
    }

    /// Number of distinct stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records pushed so far, duplicates included.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Records folded into an earlier one.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.merged
    }

    pub fn records(&self) -> impl Iterator<Item = &StoreRecord> {
        self.entries.values()
    }

    /// Merged records in order of first discovery.
    #[must_use]
    pub fn into_records(self) -> Vec<StoreRecord> {
        self.entries.into_values().collect()
    }
}

impl Extend<StoreRecord> for RecordDeduplicator {
    fn extend<I: IntoIterator<Item = StoreRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

fn clear_blanks(record: &mut StoreRecord) {
    let blank: Vec<String> = record
        .fields()
        .iter()
        .filter(|(_, v)| !v.is_empty() && is_blank(v))
        .map(|(k, _)| k.clone())
        .collect();
    for key in blank {
        record.insert(key, String::new());
    }
}

/// Fold `incoming` into `stored`.
///
/// Blank incoming values never replace anything, but unseen keys are still
/// added so the merged record carries the union of keys. A non-blank value
/// fills a blank or missing one. When both sides hold different non-blank
/// values the longer one wins, ties going to the lexicographically smaller,
/// so the result does not depend on arrival order. Provenance stays that of
/// the first discovery.
fn merge_into(stored: &mut StoreRecord, incoming: &StoreRecord) {
    for (key, value) in incoming.fields() {
        let replacement = match stored.get(key) {
            None => Some(value.clone()),
            Some(_) if is_blank(value) => None,
            Some(current) if is_blank(current) => Some(value.clone()),
            Some(current) if prefer(value, current) => Some(value.clone()),
            Some(_) => None,
        };
        if let Some(value) = replacement {
            stored.insert(key.clone(), value);
        }
    }
}

/// Whether `candidate` should replace the non-blank `current`.
fn prefer(candidate: &str, current: &str) -> bool {
    let (cand_len, cur_len) = (candidate.trim().chars().count(), current.trim().chars().count());
    cand_len > cur_len || (cand_len == cur_len && candidate < current)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use petlead_core::{Provenance, SearchQuery};

    use super::*;

    fn record(city: &str, fields: &[(&str, &str)]) -> StoreRecord {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let provenance = Provenance::for_query("Fressnapf Finder", &SearchQuery::city(city, 50), at);
        fields
            .iter()
            .fold(StoreRecord::new(provenance), |r, (k, v)| r.with_field(*k, *v))
    }

    #[test]
    fn normalize_identity_folds_case_and_whitespace() {
        assert_eq!(
            normalize_identity("  Maximilianstr.   12 \t"),
            "maximilianstr. 12"
        );
        assert_eq!(normalize_identity("FUTTERHAUS"), "futterhaus");
    }

    #[test]
    fn key_uses_name_and_address_when_present() {
        let a = record("Berlin", &[("name", "Futterhaus"), ("address", "Maximilianstr. 12")]);
        let b = record(
            "Hamburg",
            &[("name", "futterhaus"), ("address", "maximilianstr.  12 "), ("phone", "1")],
        );
        let key = DedupKey::for_record(&a);
        assert!(matches!(key, DedupKey::NameAddress(_)));
        assert_eq!(key, DedupKey::for_record(&b));
        assert_eq!(key.digest().len(), 64, "SHA-256 hex is 64 chars");
        assert!(key.to_string().starts_with("na:"));
    }

    #[test]
    fn key_falls_back_to_content_hash() {
        let a = record("Berlin", &[("title", "Zoo Zajac"), ("zip", "47166")]);
        let b = record("Essen", &[("zip", "47166"), ("title", "Zoo Zajac"), ("fax", "")]);
        let c = record("Essen", &[("title", "Zoo Zajac"), ("zip", "47167")]);
        let key = DedupKey::for_record(&a);
        assert!(matches!(key, DedupKey::Content(_)));
        assert_eq!(key, DedupKey::for_record(&b), "field order and blanks are ignored");
        assert_ne!(key, DedupKey::for_record(&c));
    }

    #[test]
    fn blank_address_falls_back_to_content_hash() {
        let a = record("Berlin", &[("name", "Futterhaus"), ("address", "  ")]);
        assert!(matches!(DedupKey::for_record(&a), DedupKey::Content(_)));
    }

    #[test]
    fn merges_futterhaus_records_across_search_cities() {
        let mut dedup = RecordDeduplicator::new();
        let first = record(
            "München",
            &[("name", "Futterhaus"), ("address", "Maximilianstr. 12"), ("city", "München")],
        );
        let second = record(
            "Augsburg",
            &[("name", "futterhaus"), ("address", "maximilianstr. 12 "), ("phone", "+49 89 1")],
        );
        assert_eq!(dedup.push(first), Admission::New);
        assert_eq!(dedup.push(second), Admission::Merged);

        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.received(), 2);
        assert_eq!(dedup.merged(), 1);

        let merged = dedup.into_records().remove(0);
        assert_eq!(merged.get("city"), Some("München"));
        assert_eq!(merged.get("phone"), Some("+49 89 1"));
        assert_eq!(merged.provenance.search_city, "München", "first discovery wins");
    }

    #[test]
    fn empty_incoming_never_overwrites() {
        let mut dedup = RecordDeduplicator::new();
        dedup.push(record("A", &[("name", "X"), ("address", "Y"), ("email", "x@y.de")]));
        dedup.push(record("B", &[("name", "X"), ("address", "Y"), ("email", ""), ("fax", "")]));
        let merged = dedup.into_records().remove(0);
        assert_eq!(merged.get("email"), Some("x@y.de"));
        assert_eq!(merged.get("fax"), Some(""), "unseen keys join the key set");
    }

    #[test]
    fn non_empty_incoming_fills_blank() {
        let mut dedup = RecordDeduplicator::new();
        dedup.push(record("A", &[("name", "X"), ("address", "Y"), ("phone", " ")]));
        dedup.push(record("B", &[("name", "X"), ("address", "Y"), ("phone", "0301234")]));
        let merged = dedup.into_records().remove(0);
        assert_eq!(merged.get("phone"), Some("0301234"));
    }

    #[test]
    fn output_size_equals_distinct_keys_and_no_value_is_lost() {
        let inputs = vec![
            record("A", &[("name", "Futterhaus"), ("address", "Hauptstr. 1"), ("phone", "1")]),
            record("B", &[("name", "Zoo & Co"), ("address", "Ringstr. 5")]),
            record("C", &[("name", "FUTTERHAUS"), ("address", "hauptstr. 1"), ("email", "a@b.de")]),
            record("D", &[("title", "Hundeladen"), ("zip", "10115")]),
            record("E", &[("zip", "10115"), ("title", "Hundeladen"), ("web", "hundeladen.de")]),
            record("F", &[("name", "Zoo & Co"), ("address", "Ringstr.  5"), ("hours", "9-18")]),
        ];
        let distinct: std::collections::HashSet<DedupKey> =
            inputs.iter().map(DedupKey::for_record).collect();

        let mut dedup = RecordDeduplicator::new();
        dedup.extend(inputs.clone());
        assert_eq!(dedup.len(), distinct.len());

        for input in &inputs {
            let key = DedupKey::for_record(input);
            let merged = dedup
                .records()
                .find(|r| DedupKey::for_record(r) == key)
                .expect("merged record for key");
            for (field, value) in input.fields() {
                if !is_blank(value) {
                    assert!(
                        merged.non_empty(field).is_some(),
                        "field {field} lost for {key}"
                    );
                }
            }
        }
    }

    #[test]
    fn merge_is_order_independent_for_fields() {
        let inputs = vec![
            record("A", &[("name", "Futterhaus"), ("address", "Hauptstr. 1"), ("phone", "1")]),
            record("B", &[("name", "futterhaus"), ("address", "Hauptstr. 1"), ("phone", "0891")]),
            record("C", &[("name", "Futterhaus"), ("address", "HAUPTSTR. 1"), ("email", "a@b.de")]),
            record("D", &[("name", "Futterhaus"), ("address", "Hauptstr. 1"), ("email", "")]),
            record("E", &[("name", "Futterhaus"), ("address", "Hauptstr. 1"), ("fax", "   ")]),
            record("F", &[("name", "Futterhaus"), ("address", "Hauptstr. 1"), ("fax", "")]),
        ];

        let merge = |order: &[usize]| {
            let mut dedup = RecordDeduplicator::new();
            for &i in order {
                dedup.push(inputs[i].clone());
            }
            dedup.into_records().remove(0)
        };

        let reference = merge(&[0, 1, 2, 3, 4, 5]);
        for order in [
            [5, 4, 3, 2, 1, 0],
            [4, 1, 3, 0, 5, 2],
            [2, 0, 5, 3, 1, 4],
        ] {
            let merged = merge(&order);
            assert_eq!(merged.fields(), reference.fields(), "order {order:?}");
        }
        assert_eq!(reference.get("phone"), Some("0891"), "longer value wins");
        assert_eq!(reference.get("address"), Some("HAUPTSTR. 1"));
        assert_eq!(reference.get("name"), Some("Futterhaus"));
        assert_eq!(reference.get("fax"), Some(""), "blank values are stored as empty");
    }

    #[test]
    fn whitespace_only_value_is_stored_empty() {
        let mut dedup = RecordDeduplicator::new();
        dedup.push(record("A", &[("name", "X"), ("address", "Y"), ("fax", " \t ")]));
        let stored = dedup.into_records().remove(0);
        assert_eq!(stored.get("fax"), Some(""));
        let keys: Vec<&str> = stored.keys().collect();
        assert_eq!(keys, vec!["name", "address", "fax"]);
    }

    #[test]
    fn keeps_discovery_order() {
        let mut dedup = RecordDeduplicator::new();
        dedup.push(record("A", &[("name", "B-Shop"), ("address", "1")]));
        dedup.push(record("A", &[("name", "A-Shop"), ("address", "2")]));
        dedup.push(record("B", &[("name", "b-shop"), ("address", "1")]));
        let names: Vec<String> = dedup
            .into_records()
            .iter()
            .map(|r| r.get("name").unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["B-Shop", "A-Shop"]);
    }
}
