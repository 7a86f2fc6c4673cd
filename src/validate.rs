use log::{info, warn};
use serde::Serialize;

use crate::{
    error::InventoryError,
    normalize::DetectionMap,
    synonyms::{CanonicalField, SynonymDictionary},
};

/// Fields the report cannot be built without.
pub const REQUIRED_FIELDS: [CanonicalField; 3] = [
    CanonicalField::Product,
    CanonicalField::Stock,
    CanonicalField::UnitPrice,
];

/// Fields that only unlock extra aggregations.
pub const OPTIONAL_FIELDS: [CanonicalField; 2] =
    [CanonicalField::Category, CanonicalField::Supplier];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validation {
    Usable,
    Rejected { missing: Vec<CanonicalField> },
}

impl Validation {
    pub fn is_usable(&self) -> bool {
        matches!(self, Validation::Usable)
    }

    /// Turns a rejection into the error reported to the caller, with synonym hints.
    pub fn into_result(self, dictionary: &SynonymDictionary) -> Result<(), InventoryError> {
        match self {
            Validation::Usable => Ok(()),
            Validation::Rejected { missing } => {
                let hints = missing.iter().map(|field| dictionary.hint(*field)).collect();
                Err(InventoryError::MissingFields { missing, hints })
            }
        }
    }
}

/// Checks that every required field was detected, listing the ones that were not.
pub fn validate(detection: &DetectionMap, required: &[CanonicalField]) -> Validation {
    let missing = required
        .iter()
        .copied()
        .filter(|field| !detection.contains(*field))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        info!("All {} required field(s) detected", required.len());
        for field in OPTIONAL_FIELDS {
            if !detection.contains(field) {
                warn!(
                    "Optional field {} not detected; related aggregations are unavailable",
                    field.label()
                );
            }
        }
        Validation::Usable
    } else {
        Validation::Rejected { missing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize::detect_columns, synonyms::SynonymDictionary};

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn item_qty_cost_headers_are_usable() {
        let dictionary = SynonymDictionary::new([
            (CanonicalField::Product, vec!["item"]),
            (CanonicalField::Stock, vec!["qty"]),
            (CanonicalField::UnitPrice, vec!["cost"]),
        ])
        .expect("dictionary");
        let detection = detect_columns(&headers(&["Item Name", "Qty", "Unit Cost"]), &dictionary);
        assert_eq!(validate(&detection, &REQUIRED_FIELDS), Validation::Usable);
        assert_eq!(detection.len(), 3);
    }

    #[test]
    fn description_only_misses_every_required_field() {
        let dictionary = SynonymDictionary::new([
            (CanonicalField::Product, vec!["item"]),
            (CanonicalField::Stock, vec!["qty"]),
            (CanonicalField::UnitPrice, vec!["cost"]),
        ])
        .expect("dictionary");
        let detection = detect_columns(&headers(&["Description"]), &dictionary);
        assert_eq!(
            validate(&detection, &REQUIRED_FIELDS),
            Validation::Rejected {
                missing: REQUIRED_FIELDS.to_vec()
            }
        );
    }

    #[test]
    fn optional_fields_do_not_block() {
        let detection = detect_columns(
            &headers(&["Producto", "Stock", "Precio"]),
            &SynonymDictionary::default(),
        );
        assert!(validate(&detection, &REQUIRED_FIELDS).is_usable());
    }

    #[test]
    fn rejection_converts_to_missing_fields_error_with_hints() {
        let dictionary = SynonymDictionary::default();
        let detection = detect_columns(&headers(&["Producto"]), &dictionary);
        let err = validate(&detection, &REQUIRED_FIELDS)
            .into_result(&dictionary)
            .expect_err("stock and price missing");
        match &err {
            InventoryError::MissingFields { missing, hints } => {
                assert_eq!(missing, &[CanonicalField::Stock, CanonicalField::UnitPrice]);
                assert_eq!(hints.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("Stock, Unit Price"));
        assert!(err.to_string().contains("'Existencias'"));
    }
}
