//! Grouped sums and Category × Supplier pivots over the enriched table.
//!
//! Every function here is a pure read of an [`EnrichedTable`]; none of them
//! truncates unless asked through [`Series::top`]. Rows whose grouping cell is
//! blank do not contribute to any group.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{metrics::EnrichedTable, synonyms::CanonicalField};

/// Slices kept for chart-oriented series.
pub const CHART_TOP_N: usize = 20;

/// Numeric column being summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Stock,
    TotalValue,
}

impl Measure {
    pub fn label(&self) -> &'static str {
        match self {
            Measure::Stock => CanonicalField::Stock.label(),
            Measure::TotalValue => crate::synonyms::TOTAL_VALUE_HEADER,
        }
    }

    fn value(&self, table: &EnrichedTable, row: usize) -> f64 {
        match self {
            Measure::Stock => table.stock(row),
            Measure::TotalValue => table.total_value(row),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Largest sum first, for charts. Equal sums keep first-seen order.
    #[default]
    ValueDescending,
    /// Groups in the order they first appear in the table.
    Insertion,
    LabelAscending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Category,
    Supplier,
    CategoryBySupplier,
}

impl GroupBy {
    /// Fields that must be detected for this grouping.
    pub fn fields(&self) -> &'static [CanonicalField] {
        match self {
            GroupBy::Category => &[CanonicalField::Category],
            GroupBy::Supplier => &[CanonicalField::Supplier],
            GroupBy::CategoryBySupplier => &[CanonicalField::Category, CanonicalField::Supplier],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    pub label: String,
    pub value: f64,
}

/// One-dimensional grouped sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: CanonicalField,
    pub measure: Measure,
    pub entries: Vec<SeriesEntry>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.value).sum()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.value)
    }

    /// The `n` largest entries, largest first. `self` is left untouched.
    pub fn top(&self, n: usize) -> Series {
        let entries = self
            .entries
            .iter()
            .cloned()
            .sorted_by(|a, b| b.value.total_cmp(&a.value))
            .take(n)
            .collect();
        Series {
            key: self.key,
            measure: self.measure,
            entries,
        }
    }
}

/// Two-dimensional sum with zero-filled missing combinations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pivot {
    pub row_field: CanonicalField,
    pub column_field: CanonicalField,
    pub measure: Measure,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `cells[row][column]`, aligned with `rows` and `columns`.
    pub cells: Vec<Vec<f64>>,
}

impl Pivot {
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|label| label == row)?;
        let c = self.columns.iter().position(|label| label == column)?;
        Some(self.cells[r][c])
    }

    pub fn grand_total(&self) -> f64 {
        self.cells.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregation {
    OneDimensional(Series),
    TwoDimensional(Pivot),
    /// A grouping field was not detected in the input.
    Unavailable { missing: Vec<CanonicalField> },
}

/// Groups `table` by `group` and sums `measure`.
pub fn aggregate_by(
    table: &EnrichedTable,
    group: GroupBy,
    measure: Measure,
    order: SortOrder,
) -> Aggregation {
    let (category, supplier) = (CanonicalField::Category, CanonicalField::Supplier);
    let aggregation = match group {
        GroupBy::Category => {
            group_sum(table, category, measure, order).map(Aggregation::OneDimensional)
        }
        GroupBy::Supplier => {
            group_sum(table, supplier, measure, order).map(Aggregation::OneDimensional)
        }
        GroupBy::CategoryBySupplier => {
            pivot(table, category, supplier, measure).map(Aggregation::TwoDimensional)
        }
    };
    aggregation.unwrap_or_else(|| {
        let missing = group
            .fields()
            .iter()
            .copied()
            .filter(|field| !table.has_field(*field))
            .collect::<Vec<_>>();
        debug!("Aggregation {group:?} unavailable; missing {missing:?}");
        Aggregation::Unavailable { missing }
    })
}

/// Category × Supplier when both exist, Category alone when only it exists.
pub fn best_pivot(table: &EnrichedTable) -> Aggregation {
    if table.has_field(CanonicalField::Supplier) {
        aggregate_by(
            table,
            GroupBy::CategoryBySupplier,
            Measure::TotalValue,
            SortOrder::LabelAscending,
        )
    } else {
        aggregate_by(
            table,
            GroupBy::Category,
            Measure::TotalValue,
            SortOrder::LabelAscending,
        )
    }
}

/// Sums `measure` per distinct value of `key`; `None` when `key` was not detected.
pub fn group_sum(
    table: &EnrichedTable,
    key: CanonicalField,
    measure: Measure,
    order: SortOrder,
) -> Option<Series> {
    let column = table.column(key)?;
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<SeriesEntry> = Vec::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        let Some(label) = row[column].group_key() else {
            continue;
        };
        let value = measure.value(table, row_idx);
        match positions.get(&label) {
            Some(&idx) => entries[idx].value += value,
            None => {
                positions.insert(label.clone(), entries.len());
                entries.push(SeriesEntry { label, value });
            }
        }
    }
    match order {
        SortOrder::Insertion => {}
        SortOrder::ValueDescending => entries.sort_by(|a, b| b.value.total_cmp(&a.value)),
        SortOrder::LabelAscending => entries.sort_by(|a, b| a.label.cmp(&b.label)),
    }
    Some(Series {
        key,
        measure,
        entries,
    })
}

/// Cross-tabulates `measure` by the distinct values of two fields.
pub fn pivot(
    table: &EnrichedTable,
    row_field: CanonicalField,
    column_field: CanonicalField,
    measure: Measure,
) -> Option<Pivot> {
    let row_column = table.column(row_field)?;
    let column_column = table.column(column_field)?;
    let keyed = table
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(row_idx, row)| {
            let row_key = row[row_column].group_key()?;
            let column_key = row[column_column].group_key()?;
            Some((row_key, column_key, measure.value(table, row_idx)))
        })
        .collect::<Vec<_>>();

    let rows = keyed.iter().map(|(r, _, _)| r.clone()).unique().sorted().collect::<Vec<_>>();
    let columns = keyed.iter().map(|(_, c, _)| c.clone()).unique().sorted().collect::<Vec<_>>();
    let row_index: HashMap<&str, usize> =
        rows.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect();
    let column_index: HashMap<&str, usize> =
        columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

    let mut cells = vec![vec![0.0; columns.len()]; rows.len()];
    for (row_key, column_key, value) in &keyed {
        cells[row_index[row_key.as_str()]][column_index[column_key.as_str()]] += value;
    }

    Some(Pivot {
        row_field,
        column_field,
        measure,
        rows,
        columns,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::CellValue, metrics::derive, normalize::normalize, raw::RawTable,
        synonyms::SynonymDictionary,
    };

    fn enriched(headers: &[&str], rows: &[&[&str]]) -> EnrichedTable {
        let raw = RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| CellValue::from_text(c)).collect())
                .collect(),
        )
        .expect("raw table");
        let normalized = normalize(&raw, &SynonymDictionary::default());
        derive(&normalized).expect("derive").0
    }

    fn inventory() -> EnrichedTable {
        enriched(
            &["Product", "Category", "Supplier", "Stock", "Price"],
            &[
                &["Hammer", "Tools", "Acme", "2", "10"],
                &["Brush", "Paint", "Acme", "5", "3"],
                &["Saw", "Tools", "Bolt Co", "1", "30"],
                &["Roller", "Paint", "", "4", "2"],
                &["Wrench", "Tools", "Acme", "3", "5"],
            ],
        )
    }

    #[test]
    fn category_sums_in_each_order() {
        let table = inventory();
        let descending = group_sum(
            &table,
            CanonicalField::Category,
            Measure::TotalValue,
            SortOrder::ValueDescending,
        )
        .expect("series");
        let labels = descending.entries.iter().map(|e| e.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, ["Tools", "Paint"]);
        assert_eq!(descending.get("Tools"), Some(65.0));
        assert_eq!(descending.get("Paint"), Some(23.0));

        let ascending = group_sum(
            &table,
            CanonicalField::Category,
            Measure::TotalValue,
            SortOrder::LabelAscending,
        )
        .expect("series");
        assert_eq!(ascending.entries[0].label, "Paint");

        let insertion =
            group_sum(&table, CanonicalField::Category, Measure::TotalValue, SortOrder::Insertion)
                .expect("series");
        assert_eq!(insertion.entries[0].label, "Tools");
    }

    #[test]
    fn pivot_cells_sum_matching_rows_and_fill_zero() {
        let table = inventory();
        let Aggregation::TwoDimensional(pivot) = best_pivot(&table) else {
            panic!("expected a two-dimensional pivot");
        };
        assert_eq!(pivot.rows, ["Paint", "Tools"]);
        assert_eq!(pivot.columns, ["Acme", "Bolt Co"]);
        assert_eq!(pivot.get("Tools", "Acme"), Some(35.0));
        assert_eq!(pivot.get("Tools", "Bolt Co"), Some(30.0));
        assert_eq!(pivot.get("Paint", "Acme"), Some(15.0));
        assert_eq!(pivot.get("Paint", "Bolt Co"), Some(0.0));
        // Roller has no supplier and stays out of the pivot.
        assert_eq!(pivot.grand_total(), 80.0);
    }

    #[test]
    fn pivot_total_matches_summary_when_keys_complete() {
        let table = enriched(
            &["Product", "Category", "Supplier", "Stock", "Price"],
            &[
                &["A", "X", "S1", "2", "1.5"],
                &["B", "Y", "S2", "3", "2"],
                &["C", "X", "S2", "abc", "9"],
            ],
        );
        let total = (0..table.row_count()).map(|r| table.total_value(r)).sum::<f64>();
        let pivot = pivot(
            &table,
            CanonicalField::Category,
            CanonicalField::Supplier,
            Measure::TotalValue,
        )
        .expect("pivot");
        assert_eq!(pivot.grand_total(), total);
    }

    #[test]
    fn missing_category_is_unavailable_not_empty() {
        let table = enriched(&["Product", "Stock", "Price"], &[&["A", "1", "1"]]);
        assert_eq!(
            best_pivot(&table),
            Aggregation::Unavailable {
                missing: vec![CanonicalField::Category]
            }
        );
        assert_eq!(
            aggregate_by(&table, GroupBy::Supplier, Measure::TotalValue, SortOrder::Insertion),
            Aggregation::Unavailable {
                missing: vec![CanonicalField::Supplier]
            }
        );
        assert_eq!(
            aggregate_by(
                &table,
                GroupBy::CategoryBySupplier,
                Measure::TotalValue,
                SortOrder::LabelAscending,
            ),
            Aggregation::Unavailable {
                missing: vec![CanonicalField::Category, CanonicalField::Supplier]
            }
        );
    }

    #[test]
    fn category_only_pivot_when_supplier_absent() {
        let table = enriched(
            &["Product", "Familia", "Stock", "Price"],
            &[&["A", "X", "1", "2"], &["B", "X", "1", "3"]],
        );
        let Aggregation::OneDimensional(series) = best_pivot(&table) else {
            panic!("expected a category series");
        };
        assert_eq!(series.key, CanonicalField::Category);
        assert_eq!(series.get("X"), Some(5.0));
    }

    #[test]
    fn chart_series_caps_at_top_twenty() {
        let rows = (1..=25)
            .map(|i| vec![format!("P{i:02}"), i.to_string(), "1".to_string()])
            .collect::<Vec<_>>();
        let row_refs = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let slices = row_refs.iter().map(Vec::as_slice).collect::<Vec<_>>();
        let table = enriched(&["Product", "Stock", "Price"], &slices);

        let full = group_sum(
            &table,
            CanonicalField::Product,
            Measure::TotalValue,
            SortOrder::Insertion,
        )
        .expect("series");
        assert_eq!(full.len(), 25);
        let chart = full.top(CHART_TOP_N);
        assert_eq!(chart.len(), 20);
        assert_eq!(chart.entries[0].label, "P25");
        assert_eq!(chart.entries[19].label, "P06");
        assert_eq!(full.len(), 25);
    }

    #[test]
    fn blank_keys_are_skipped_in_group_sums() {
        let table = enriched(
            &["Product", "Stock", "Price"],
            &[&["A", "1", "1"], &["", "7", "1"], &["A", "2", "1"]],
        );
        let series =
            group_sum(&table, CanonicalField::Product, Measure::Stock, SortOrder::Insertion)
                .expect("series");
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("A"), Some(3.0));
    }
}
