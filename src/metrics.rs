//! Derived columns and summary statistics over the normalized table.
//!
//! Stock and Unit Price are coerced to numbers (bad cells become zero) and
//! `Total Value = Stock × Unit Price` is recomputed for every row. Any input
//! column already named `Total Value`, in any letter case, is overwritten and
//! never trusted.

use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::{CellValue, coerce_number, parse_number},
    error::InventoryError,
    normalize::NormalizedTable,
    synonyms::{CanonicalField, TOTAL_VALUE_HEADER, normalize_token},
};

/// Normalized table plus numeric Stock/Unit Price and the Total Value column.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    product: Option<usize>,
    category: Option<usize>,
    supplier: Option<usize>,
    stock: usize,
    unit_price: usize,
    total_value: usize,
}

impl EnrichedTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        match field {
            CanonicalField::Product => self.product,
            CanonicalField::Category => self.category,
            CanonicalField::Supplier => self.supplier,
            CanonicalField::Stock => Some(self.stock),
            CanonicalField::UnitPrice => Some(self.unit_price),
        }
    }

    pub fn total_value_column(&self) -> usize {
        self.total_value
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.column(field).is_some()
    }

    pub fn cell(&self, row: usize, field: CanonicalField) -> Option<&CellValue> {
        let column = self.column(field)?;
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    pub fn stock(&self, row: usize) -> f64 {
        self.number_at(row, self.stock)
    }

    pub fn unit_price(&self, row: usize) -> f64 {
        self.number_at(row, self.unit_price)
    }

    pub fn total_value(&self, row: usize) -> f64 {
        self.number_at(row, self.total_value)
    }

    fn number_at(&self, row: usize, column: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(coerce_number)
            .unwrap_or(0.0)
    }

    /// Rows whose Category is one of `categories`; unchanged when Category is absent.
    pub fn filter_categories(&self, categories: &[String]) -> EnrichedTable {
        let Some(column) = self.category else {
            if !categories.is_empty() {
                warn!("Category column not detected; ignoring category filter");
            }
            return self.clone();
        };
        if categories.is_empty() {
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row[column]
                    .group_key()
                    .is_some_and(|key| categories.iter().any(|c| c.trim() == key))
            })
            .cloned()
            .collect::<Vec<_>>();
        debug!(
            "Category filter kept {} of {} row(s)",
            rows.len(),
            self.rows.len()
        );
        EnrichedTable {
            rows,
            headers: self.headers.clone(),
            ..*self
        }
    }
}

/// Read-only snapshot recomputed on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub total_value: f64,
    pub avg_price: f64,
    pub max_stock_product: Option<String>,
    pub min_stock_product: Option<String>,
    pub max_stock: Option<f64>,
    pub min_stock: Option<f64>,
    /// Non-blank Stock/Unit Price cells that did not read as numbers.
    pub coerced_cells: usize,
}

/// Coerces Stock/Unit Price, appends Total Value and computes the summary.
pub fn derive(table: &NormalizedTable) -> Result<(EnrichedTable, SummaryStats), InventoryError> {
    let missing = [CanonicalField::Stock, CanonicalField::UnitPrice]
        .into_iter()
        .filter(|field| table.column(*field).is_none())
        .collect::<Vec<_>>();
    let (Some(stock), Some(unit_price)) = (
        table.column(CanonicalField::Stock),
        table.column(CanonicalField::UnitPrice),
    ) else {
        let hints = missing.iter().map(|f| format!("'{}'", f.label())).collect();
        return Err(InventoryError::MissingFields { missing, hints });
    };

    let mut headers = table.headers().to_vec();
    let derived = normalize_token(TOTAL_VALUE_HEADER);
    let total_value = match headers.iter().position(|h| normalize_token(h) == derived) {
        Some(existing) => {
            debug!(
                "Overwriting input column '{}' with recomputed values",
                headers[existing]
            );
            headers[existing] = TOTAL_VALUE_HEADER.to_string();
            existing
        }
        None => {
            headers.push(TOTAL_VALUE_HEADER.to_string());
            headers.len() - 1
        }
    };

    let mut coerced_cells = 0usize;
    let mut accumulator = StockAccumulator::default();
    let mut rows = Vec::with_capacity(table.row_count());
    for (row_idx, source) in table.rows().iter().enumerate() {
        let mut row = source.clone();
        row.resize(headers.len(), CellValue::Empty);
        let stock_value = coerce_cell(&mut row[stock], &mut coerced_cells);
        let price_value = coerce_cell(&mut row[unit_price], &mut coerced_cells);
        let value = stock_value * price_value;
        row[total_value] = CellValue::Number(value);
        accumulator.add(row_idx, stock_value, price_value, value);
        rows.push(row);
    }
    if coerced_cells > 0 {
        debug!("Coerced {coerced_cells} non-numeric Stock/Unit Price cell(s) to zero");
    }

    let enriched = EnrichedTable {
        headers,
        rows,
        product: table.column(CanonicalField::Product),
        category: table.column(CanonicalField::Category),
        supplier: table.column(CanonicalField::Supplier),
        stock,
        unit_price,
        total_value,
    };
    let stats = accumulator.finish(&enriched, coerced_cells);
    if stats.count == 0 {
        warn!("Input has no data rows; statistics default to zero");
    }
    Ok((enriched, stats))
}

fn coerce_cell(cell: &mut CellValue, coerced: &mut usize) -> f64 {
    let value = match parse_number(cell) {
        Some(value) => value,
        None => {
            if !cell.is_empty() {
                *coerced += 1;
            }
            0.0
        }
    };
    *cell = CellValue::Number(value);
    value
}

#[derive(Default)]
struct StockAccumulator {
    count: usize,
    total_value: f64,
    price_sum: f64,
    max: Option<(usize, f64)>,
    min: Option<(usize, f64)>,
}

impl StockAccumulator {
    fn add(&mut self, row: usize, stock: f64, price: f64, value: f64) {
        self.count += 1;
        self.total_value += value;
        self.price_sum += price;
        // strict comparisons keep the first occurrence on ties
        if self.max.is_none_or(|(_, current)| stock > current) {
            self.max = Some((row, stock));
        }
        if self.min.is_none_or(|(_, current)| stock < current) {
            self.min = Some((row, stock));
        }
    }

    fn finish(self, table: &EnrichedTable, coerced_cells: usize) -> SummaryStats {
        let product_at = |extreme: Option<(usize, f64)>| {
            let (row, _) = extreme?;
            let cell = table.cell(row, CanonicalField::Product)?;
            Some(cell.as_display().trim().to_string())
        };
        SummaryStats {
            count: self.count,
            total_value: self.total_value,
            avg_price: if self.count > 0 {
                self.price_sum / self.count as f64
            } else {
                0.0
            },
            max_stock_product: product_at(self.max),
            min_stock_product: product_at(self.min),
            max_stock: self.max.map(|(_, stock)| stock),
            min_stock: self.min.map(|(_, stock)| stock),
            coerced_cells,
        }
    }
}
