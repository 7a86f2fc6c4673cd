//! Header normalization: mapping arbitrary raw headers onto canonical fields.
//!
//! Resolution walks the canonical fields in declaration order. For each field
//! its synonyms are tried in priority order, and for each synonym the raw
//! headers are scanned left to right; the first unclaimed header whose
//! trimmed, lowercased text contains the synonym is claimed. A claimed header
//! is never offered to a later field, so the resulting [`DetectionMap`] is
//! injective in both directions.
//!
//! Renaming happens last: claimed headers take their canonical label and every
//! other column passes through untouched.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::{
    data::CellValue,
    raw::RawTable,
    synonyms::{CanonicalField, SynonymDictionary, normalize_token},
};

/// Canonical field → raw header it was detected in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectionMap {
    fields: BTreeMap<CanonicalField, String>,
}

impl DetectionMap {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Detected fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> + '_ {
        self.fields
            .iter()
            .map(|(field, header)| (*field, header.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn contains_label(&self, header: &str) -> bool {
        self.fields.keys().any(|field| field.label() == header)
    }

    /// Canonical field a raw header was claimed for, if any.
    pub fn field_for(&self, header: &str) -> Option<CanonicalField> {
        self.fields
            .iter()
            .find(|(_, claimed)| claimed.as_str() == header)
            .map(|(field, _)| *field)
    }
}

/// The raw table with claimed columns renamed to their canonical labels.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    detection: DetectionMap,
    unmapped: Vec<String>,
}

impl NormalizedTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn detection(&self) -> &DetectionMap {
        &self.detection
    }

    /// Raw headers that passed through without a canonical role.
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Column index of a canonical field, if it was detected.
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        if !self.detection.contains(field) {
            return None;
        }
        self.headers.iter().position(|h| h == field.label())
    }

    /// Re-exposes the normalized columns as a raw table.
    pub fn to_raw(&self) -> RawTable {
        RawTable::from_parts(self.headers.clone(), self.rows.clone())
    }
}

/// Resolves which raw header holds each canonical field.
pub fn detect_columns(headers: &[String], dictionary: &SynonymDictionary) -> DetectionMap {
    let lowered = headers
        .iter()
        .map(|header| normalize_token(header))
        .collect::<Vec<_>>();
    let mut claimed = vec![false; headers.len()];
    let mut fields = BTreeMap::new();

    for field in dictionary.fields() {
        let found = dictionary.synonyms(field).iter().find_map(|synonym| {
            lowered
                .iter()
                .enumerate()
                .find(|(idx, header)| !claimed[*idx] && header.contains(synonym.as_str()))
                .map(|(idx, _)| (idx, synonym))
        });
        if let Some((idx, synonym)) = found {
            debug!(
                "Detected {} in column '{}' via synonym '{synonym}'",
                field.label(),
                headers[idx]
            );
            claimed[idx] = true;
            fields.insert(field, headers[idx].clone());
        } else {
            debug!("No column matched {}", field.label());
        }
    }

    DetectionMap { fields }
}

/// Detects canonical columns and renames them; the input is left untouched.
///
/// A pass-through column spelled like a claimed canonical label would shadow
/// the renamed column, so it gets the `.1`, `.2` suffix used for duplicate headers.
pub fn normalize(raw: &RawTable, dictionary: &SynonymDictionary) -> NormalizedTable {
    let detection = detect_columns(raw.headers(), dictionary);
    let renamed = raw
        .headers()
        .iter()
        .map(|header| detection.field_for(header))
        .collect::<Vec<_>>();
    let mut taken = raw
        .headers()
        .iter()
        .zip(&renamed)
        .map(|(header, field)| match field {
            Some(field) => field.label().to_string(),
            None => header.clone(),
        })
        .collect::<HashSet<_>>();

    let mut unmapped = Vec::new();
    let mut headers = Vec::with_capacity(renamed.len());
    for (header, field) in raw.headers().iter().zip(&renamed) {
        match field {
            Some(field) => headers.push(field.label().to_string()),
            None if detection.contains_label(header) => {
                unmapped.push(header.clone());
                let mut suffix = 1;
                let mut candidate = format!("{header}.{suffix}");
                while taken.contains(&candidate) {
                    suffix += 1;
                    candidate = format!("{header}.{suffix}");
                }
                taken.insert(candidate.clone());
                headers.push(candidate);
            }
            None => {
                unmapped.push(header.clone());
                headers.push(header.clone());
            }
        }
    }

    NormalizedTable {
        headers,
        rows: raw.rows().to_vec(),
        detection,
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn raw_table(headers: &[&str]) -> RawTable {
        RawTable::new(headers.iter().map(|h| h.to_string()).collect(), Vec::new())
            .expect("raw table")
    }

    fn minimal_dictionary() -> SynonymDictionary {
        SynonymDictionary::new([
            (CanonicalField::Product, vec!["item"]),
            (CanonicalField::Stock, vec!["qty"]),
            (CanonicalField::UnitPrice, vec!["cost"]),
        ])
        .expect("dictionary")
    }

    #[test]
    fn detects_fields_by_substring_ignoring_case_and_whitespace() {
        let table = raw_table(&["  Item Name ", "QTY on shelf", "Unit Cost"]);
        let normalized = normalize(&table, &minimal_dictionary());
        let detection = normalized.detection();
        assert_eq!(detection.get(CanonicalField::Product), Some("  Item Name "));
        assert_eq!(detection.get(CanonicalField::Stock), Some("QTY on shelf"));
        assert_eq!(detection.get(CanonicalField::UnitPrice), Some("Unit Cost"));
        assert_eq!(normalized.headers(), ["Product", "Stock", "Unit Price"]);
        assert!(normalized.unmapped().is_empty());
    }

    #[test]
    fn earliest_synonym_beats_column_order() {
        let table = raw_table(&["Nombre", "Producto"]);
        let normalized = normalize(&table, &SynonymDictionary::default());
        assert_eq!(
            normalized.detection().get(CanonicalField::Product),
            Some("Producto")
        );
        assert_eq!(normalized.headers(), ["Nombre", "Product"]);
        assert_eq!(normalized.unmapped(), ["Nombre"]);
    }

    #[test]
    fn column_order_breaks_ties_for_the_same_synonym() {
        let table = raw_table(&["Product Code", "Product Name"]);
        let normalized = normalize(&table, &SynonymDictionary::default());
        assert_eq!(
            normalized.detection().get(CanonicalField::Product),
            Some("Product Code")
        );
        assert_eq!(normalized.headers(), ["Product", "Product Name"]);
    }

    #[test]
    fn claimed_header_is_not_offered_to_later_fields() {
        // "Product Cost" satisfies Product first; price must come from elsewhere.
        let table = raw_table(&["Product Cost", "Cost"]);
        let normalized = normalize(&table, &SynonymDictionary::default());
        let detection = normalized.detection();
        assert_eq!(detection.get(CanonicalField::Product), Some("Product Cost"));
        assert_eq!(detection.get(CanonicalField::UnitPrice), Some("Cost"));
    }

    #[test]
    fn undetected_fields_are_absent_not_errors() {
        let normalized = normalize(&raw_table(&["Description"]), &minimal_dictionary());
        assert!(normalized.detection().is_empty());
        assert_eq!(normalized.headers(), ["Description"]);
        assert_eq!(normalized.column(CanonicalField::Product), None);
    }

    #[test]
    fn passthrough_column_spelled_like_a_label_is_suffixed() {
        let dictionary = SynonymDictionary::new([(CanonicalField::Stock, vec!["qty"])])
            .expect("dictionary");
        let normalized = normalize(&raw_table(&["Stock", "Qty"]), &dictionary);
        assert_eq!(normalized.headers(), ["Stock.1", "Stock"]);
        assert_eq!(normalized.column(CanonicalField::Stock), Some(1));
    }

    #[test]
    fn rows_are_carried_over_unchanged() {
        let table = RawTable::new(
            vec!["Item".to_string(), "Notes".to_string()],
            vec![vec![
                CellValue::Text("Bolt".to_string()),
                CellValue::Text("zinc".to_string()),
            ]],
        )
        .expect("raw table");
        let normalized = normalize(&table, &minimal_dictionary());
        assert_eq!(normalized.rows(), table.rows());
        assert_eq!(normalized.row_count(), 1);
    }

    #[test]
    fn normalizing_twice_keeps_headers_and_fields() {
        let table = raw_table(&["Articulo", "Familia", "Proveedor", "Existencias", "Costo"]);
        let dictionary = SynonymDictionary::default();
        let first = normalize(&table, &dictionary);
        let second = normalize(&first.to_raw(), &dictionary);
        assert_eq!(second.headers(), first.headers());
        for (field, header) in second.detection().iter() {
            assert_eq!(header, field.label());
        }
        assert_eq!(second.detection().len(), 5);
    }

    const VOCABULARY: &[&str] = &[
        "item", "name", "qty", "stock", "price", "unit cost", "category", "tipo", "vendor",
        "notes", "sku", "location", "precio unitario", "existencias", "product code", "total",
        "Supplier", "FAMILIA", "units", "descr",
    ];

    fn header_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(VOCABULARY), 1..3)
            .prop_map(|parts| parts.join(" "))
    }

    fn table_strategy() -> impl Strategy<Value = RawTable> {
        prop::collection::vec(header_strategy(), 0..8)
            .prop_map(|headers| RawTable::new(headers, Vec::new()).expect("raw table"))
    }

    proptest! {
        #[test]
        fn detection_is_injective(table in table_strategy()) {
            let detection = detect_columns(table.headers(), &SynonymDictionary::default());
            let headers = detection.iter().map(|(_, header)| header).collect::<Vec<_>>();
            let unique = headers.iter().collect::<HashSet<_>>();
            prop_assert_eq!(unique.len(), headers.len());
            for header in headers {
                prop_assert!(table.headers().iter().any(|h| h == header));
            }
        }

        #[test]
        fn renaming_is_idempotent(table in table_strategy()) {
            let dictionary = SynonymDictionary::default();
            let first = normalize(&table, &dictionary);
            let second = normalize(&first.to_raw(), &dictionary);
            prop_assert_eq!(second.headers(), first.headers());
            let first_fields = first.detection().iter().map(|(f, _)| f).collect::<Vec<_>>();
            let second_fields = second.detection().iter().map(|(f, _)| f).collect::<Vec<_>>();
            prop_assert_eq!(first_fields, second_fields);
            for (field, header) in second.detection().iter() {
                prop_assert_eq!(header, field.label());
            }
        }
    }
}
