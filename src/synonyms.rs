//! Canonical inventory fields and the synonym dictionary used to recognize them.
//!
//! The dictionary maps each [`CanonicalField`] to an ordered list of lowercase
//! substrings. Order matters twice: fields are resolved in declaration order,
//! and within a field the first synonym that matches any header wins.
//!
//! Dictionaries round-trip through YAML so users can extend the defaults:
//!
//! ```yaml
//! product: [product, producto, item]
//! stock: [stock, qty]
//! unit_price: [unit price, cost]
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// Normalized column roles, declared in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Product,
    Category,
    Supplier,
    Stock,
    UnitPrice,
}

/// Header of the derived `Stock × UnitPrice` column.
pub const TOTAL_VALUE_HEADER: &str = "Total Value";

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::Product,
        CanonicalField::Category,
        CanonicalField::Supplier,
        CanonicalField::Stock,
        CanonicalField::UnitPrice,
    ];

    /// Header the field's column carries after normalization.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::Product => "Product",
            CanonicalField::Category => "Category",
            CanonicalField::Supplier => "Supplier",
            CanonicalField::Stock => "Stock",
            CanonicalField::UnitPrice => "Unit Price",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Product => "product",
            CanonicalField::Category => "category",
            CanonicalField::Supplier => "supplier",
            CanonicalField::Stock => "stock",
            CanonicalField::UnitPrice => "unit_price",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercases and trims a header or synonym for substring matching.
pub fn normalize_token(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SynonymDictionary {
    entries: BTreeMap<CanonicalField, Vec<String>>,
}

impl SynonymDictionary {
    /// Builds a dictionary, normalizing every synonym and rejecting blanks.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CanonicalField, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut normalized = BTreeMap::new();
        for (field, synonyms) in entries {
            let mut list: Vec<String> = Vec::with_capacity(synonyms.len());
            for synonym in synonyms {
                let token = normalize_token(synonym.as_ref());
                if token.is_empty() {
                    return Err(InventoryError::Dictionary(format!(
                        "field '{}' has a blank synonym",
                        field.key()
                    )));
                }
                if !list.contains(&token) {
                    list.push(token);
                }
            }
            normalized.insert(field, list);
        }
        Ok(Self {
            entries: normalized,
        })
    }

    /// Synonyms for `field` in priority order; empty when the field is not configured.
    pub fn synonyms(&self, field: CanonicalField) -> &[String] {
        self.entries
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Configured fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = CanonicalField> + '_ {
        self.entries.keys().copied()
    }

    /// Human-readable examples for an error message, e.g. `'Stock'/'Existencias'/'Cantidad'`.
    pub fn hint(&self, field: CanonicalField) -> String {
        let examples = self
            .synonyms(field)
            .iter()
            .take(3)
            .map(|synonym| format!("'{}'", title_case(synonym)))
            .collect::<Vec<_>>();
        if examples.is_empty() {
            format!("'{}'", field.label())
        } else {
            examples.join("/")
        }
    }

    /// Reports configurations under which renaming an already normalized
    /// table would not be stable: a canonical label that does not contain its
    /// own first synonym, or that contains another field's synonym.
    pub fn unstable_labels(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for field in self.fields() {
            let label = normalize_token(field.label());
            match self.synonyms(field).first() {
                Some(first) if label.contains(first.as_str()) => {}
                Some(first) => problems.push(format!(
                    "'{}' does not contain its first synonym '{first}'",
                    field.label()
                )),
                None => continue,
            }
            for other in self.fields().filter(|other| *other != field) {
                if let Some(synonym) = self
                    .synonyms(other)
                    .iter()
                    .find(|synonym| label.contains(synonym.as_str()))
                {
                    problems.push(format!(
                        "'{}' also matches {} synonym '{synonym}'",
                        field.label(),
                        other.label()
                    ));
                }
            }
        }
        problems
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<CanonicalField, Vec<String>> =
            serde_yaml::from_reader(BufReader::new(file))?;
        let dictionary = Self::new(raw)?;
        for problem in dictionary.unstable_labels() {
            warn!("Synonym dictionary {path:?}: {problem}");
        }
        Ok(dictionary)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}

impl Default for SynonymDictionary {
    /// English and Spanish synonyms for every canonical field.
    fn default() -> Self {
        let entries: [(CanonicalField, &[&str]); 5] = [
            (
                CanonicalField::Product,
                &[
                    "product",
                    "producto",
                    "artículo",
                    "articulo",
                    "item",
                    "nombre",
                    "name",
                    "descr",
                ],
            ),
            (
                CanonicalField::Category,
                &[
                    "category",
                    "categoría",
                    "categoria",
                    "tipo",
                    "type",
                    "clase",
                    "class",
                    "grupo",
                    "group",
                    "familia",
                    "family",
                ],
            ),
            (
                CanonicalField::Supplier,
                &["supplier", "proveedor", "vendor", "distribuidor", "distributor"],
            ),
            (
                CanonicalField::Stock,
                &[
                    "stock",
                    "existencias",
                    "cantidad",
                    "quantity",
                    "disponible",
                    "available",
                    "inventario",
                    "inventory",
                    "qty",
                    "unidades",
                    "units",
                    "on hand",
                ],
            ),
            (
                CanonicalField::UnitPrice,
                &[
                    "unit price",
                    "precio unitario",
                    "precio",
                    "price",
                    "valor unitario",
                    "costo",
                    "cost",
                ],
            ),
        ];
        Self {
            entries: entries
                .into_iter()
                .map(|(field, synonyms)| {
                    (field, synonyms.iter().map(|s| (*s).to_string()).collect())
                })
                .collect(),
        }
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
