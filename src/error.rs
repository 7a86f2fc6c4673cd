//! Error taxonomy for the inventory pipeline.
//!
//! Structural problems (unreadable input, missing required columns) abort the
//! whole run and surface as a single message. Cell-level data quality issues
//! never appear here: numeric coercion defaults bad cells to zero.

use std::path::PathBuf;

use thiserror::Error;

use crate::synonyms::CanonicalField;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Input bytes could not be read as a table.
    #[error("Could not read input as a table: {0}")]
    Parse(String),

    #[error("Unsupported input format '{0}' (expected csv, tsv, xlsx, xlsm, xlsb, xls or ods)")]
    UnsupportedFormat(String),

    /// One or more required canonical fields were not detected.
    #[error(
        "Required columns not detected: {}. Accepted examples: {}",
        join_fields(.missing),
        .hints.join(", ")
    )]
    MissingFields {
        missing: Vec<CanonicalField>,
        hints: Vec<String>,
    },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Workbook export error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// The report could be assembled but not rendered into its output form.
    #[error("Could not export report: {0}")]
    Export(String),

    /// Synonym dictionary failed validation.
    #[error("Invalid synonym dictionary: {0}")]
    Dictionary(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_names_every_field_and_hint() {
        let err = InventoryError::MissingFields {
            missing: vec![CanonicalField::Product, CanonicalField::Stock],
            hints: vec![
                "'Product'/'Producto'/'Artículo'".to_string(),
                "'Stock'/'Existencias'/'Cantidad'".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("Required columns not detected: Product, Stock."));
        assert!(message.contains("'Stock'/'Existencias'/'Cantidad'"));
    }
}
