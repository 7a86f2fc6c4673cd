//! Multi-section report assembly and export.
//!
//! A [`Report`] mirrors a three-sheet workbook: the itemized inventory (with a
//! banded table region and two anchored charts), a key/value summary, and one
//! or more pivot sections. Sections are independent; an unavailable pivot
//! becomes a placeholder section instead of blocking the others.
//!
//! Export writes one CSV per section, an xlsx workbook, and a JSON or YAML
//! manifest holding the whole document. Everything is rendered in memory before the first file is
//! created, so a failure never leaves a partial report behind.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use log::{info, warn};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    aggregate::{self, Aggregation, Measure, Series, SortOrder},
    data::CellValue,
    error::{InventoryError, Result},
    metrics::{EnrichedTable, SummaryStats},
    normalize::DetectionMap,
    synonyms::{CanonicalField, TOTAL_VALUE_HEADER},
    workbook,
};

pub const INVENTORY_TITLE: &str = "AUTOMATED INVENTORY REPORT";
pub const SUMMARY_TITLE: &str = "INVENTORY SUMMARY";
pub const TABLE_STYLE: &str = "Table Style Medium 9";
pub const WORKBOOK_FILE: &str = "inventory_report.xlsx";
pub const PIVOT_UNAVAILABLE_NOTE: &str =
    "Not enough columns to build the pivot table (a Category column is required).";

/// Rows left above the itemized table for the title.
pub const TABLE_HEADER_ROW: usize = 3;
const MAX_COLUMN_WIDTH: usize = 40;
const COLUMN_PADDING: usize = 4;
const BAR_CHART_ANCHOR: &str = "H5";
const PIE_CHART_ANCHOR: &str = "H22";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
}

impl ManifestFormat {
    fn file_name(&self) -> &'static str {
        match self {
            ManifestFormat::Json => "report.json",
            ManifestFormat::Yaml => "report.yml",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub inventory: InventorySection,
    pub summary: SummarySection,
    pub pivots: Vec<PivotSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub source: String,
    pub sha256: String,
    pub generated_at: DateTime<Utc>,
    pub detected: DetectionMap,
    pub unmapped: Vec<String>,
    /// Category values the itemized section was restricted to, if any.
    pub category_filter: Vec<String>,
}

impl ReportMetadata {
    pub fn new(source: &str, bytes: &[u8], detected: DetectionMap, unmapped: Vec<String>) -> Self {
        Self {
            source: source.to_string(),
            sha256: format!("{:x}", Sha256::digest(bytes)),
            generated_at: Utc::now(),
            detected,
            unmapped,
            category_filter: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySection {
    pub sheet: String,
    pub title: String,
    pub header_row: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub table: TableRegion,
    pub column_widths: Vec<usize>,
    pub charts: Vec<ChartSpec>,
}

/// Zero-based inclusive cell range of the banded, filterable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRegion {
    pub first_row: usize,
    pub first_column: usize,
    pub last_row: usize,
    pub last_column: usize,
    pub style: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Column,
    Pie,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// Top-left cell the chart is anchored at, e.g. `H5`.
    pub anchor: String,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub series: Series,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarySection {
    pub sheet: String,
    pub title: String,
    pub entries: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: SummaryValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Count(usize),
    Amount(Decimal),
    Text(Option<String>),
}

impl SummaryValue {
    pub fn as_display(&self) -> String {
        match self {
            SummaryValue::Count(count) => count.to_string(),
            SummaryValue::Amount(amount) => amount.to_string(),
            SummaryValue::Text(text) => text.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PivotSection {
    pub sheet: String,
    pub title: String,
    pub body: Aggregation,
    /// Present when `body` is unavailable.
    pub note: Option<String>,
}

impl PivotSection {
    pub fn from_aggregation(body: Aggregation) -> Self {
        let (title, note) = match &body {
            Aggregation::TwoDimensional(pivot) => (
                format!(
                    "PIVOT: {} BY {} AND {}",
                    pivot.measure.label().to_uppercase(),
                    pivot.row_field.label().to_uppercase(),
                    pivot.column_field.label().to_uppercase()
                ),
                None,
            ),
            Aggregation::OneDimensional(series) => (
                format!(
                    "PIVOT: {} BY {}",
                    series.measure.label().to_uppercase(),
                    series.key.label().to_uppercase()
                ),
                None,
            ),
            Aggregation::Unavailable { .. } => {
                ("PIVOT".to_string(), Some(PIVOT_UNAVAILABLE_NOTE.to_string()))
            }
        };
        Self {
            sheet: "Pivot".to_string(),
            title,
            body,
            note,
        }
    }

    /// Tabular rendering: header row followed by data rows.
    pub fn to_rows(&self) -> (Vec<String>, Vec<Vec<String>>) {
        match &self.body {
            Aggregation::TwoDimensional(pivot) => {
                let mut headers = vec![pivot.row_field.label().to_string()];
                headers.extend(pivot.columns.iter().cloned());
                let rows = pivot
                    .rows
                    .iter()
                    .zip(&pivot.cells)
                    .map(|(label, cells)| {
                        let mut row = vec![label.clone()];
                        row.extend(cells.iter().map(|v| round_amount(*v).to_string()));
                        row
                    })
                    .collect();
                (headers, rows)
            }
            Aggregation::OneDimensional(series) => {
                let headers = vec![
                    series.key.label().to_string(),
                    series.measure.label().to_string(),
                ];
                let rows = series
                    .entries
                    .iter()
                    .map(|entry| {
                        vec![entry.label.clone(), round_amount(entry.value).to_string()]
                    })
                    .collect();
                (headers, rows)
            }
            Aggregation::Unavailable { .. } => (
                vec!["note".to_string()],
                vec![vec![self.note.clone().unwrap_or_default()]],
            ),
        }
    }
}

/// Inputs borrowed by [`assemble`]; nothing here is modified.
pub struct ReportInputs<'a> {
    /// Table shown in the itemized section, possibly category-filtered.
    pub itemized: &'a EnrichedTable,
    pub stats: &'a SummaryStats,
    pub pivots: &'a [Aggregation],
    pub metadata: ReportMetadata,
    pub chart_top: usize,
}

pub fn assemble(inputs: ReportInputs<'_>) -> Report {
    let ReportInputs {
        itemized,
        stats,
        pivots,
        metadata,
        chart_top,
    } = inputs;

    let pivots = if pivots.is_empty() {
        vec![PivotSection::from_aggregation(Aggregation::Unavailable {
            missing: vec![CanonicalField::Category],
        })]
    } else {
        pivots
            .iter()
            .cloned()
            .map(PivotSection::from_aggregation)
            .enumerate()
            .map(|(idx, mut section)| {
                if idx > 0 {
                    section.sheet = format!("Pivot {}", idx + 1);
                }
                section
            })
            .collect()
    };

    Report {
        metadata,
        inventory: inventory_section(itemized, chart_top),
        summary: summary_section(stats),
        pivots,
    }
}

fn inventory_section(table: &EnrichedTable, chart_top: usize) -> InventorySection {
    let columns = table.headers().to_vec();
    let rows = table.rows().to_vec();
    let region = TableRegion {
        first_row: TABLE_HEADER_ROW,
        first_column: 0,
        last_row: TABLE_HEADER_ROW + rows.len(),
        last_column: columns.len().saturating_sub(1),
        style: TABLE_STYLE.to_string(),
    };
    let column_widths = columns
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let longest = rows
                .iter()
                .map(|row| row[idx].as_display().chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count());
            (longest + COLUMN_PADDING).min(MAX_COLUMN_WIDTH)
        })
        .collect();

    InventorySection {
        sheet: "Inventory".to_string(),
        title: INVENTORY_TITLE.to_string(),
        header_row: TABLE_HEADER_ROW,
        columns,
        rows,
        table: region,
        column_widths,
        charts: chart_specs(table, chart_top),
    }
}

fn chart_specs(table: &EnrichedTable, chart_top: usize) -> Vec<ChartSpec> {
    let mut charts = Vec::new();
    if let Some(stock) = aggregate::group_sum(
        table,
        CanonicalField::Product,
        Measure::Stock,
        SortOrder::ValueDescending,
    ) {
        charts.push(ChartSpec {
            kind: ChartKind::Column,
            title: "Stock by Product".to_string(),
            anchor: BAR_CHART_ANCHOR.to_string(),
            x_axis: Some(CanonicalField::Product.label().to_string()),
            y_axis: Some(CanonicalField::Stock.label().to_string()),
            series: stock,
        });
    }
    if let Some(value) = aggregate::group_sum(
        table,
        CanonicalField::Product,
        Measure::TotalValue,
        SortOrder::ValueDescending,
    ) {
        charts.push(ChartSpec {
            kind: ChartKind::Pie,
            title: format!("{TOTAL_VALUE_HEADER} Share by Product"),
            anchor: PIE_CHART_ANCHOR.to_string(),
            x_axis: None,
            y_axis: None,
            series: value.top(chart_top),
        });
    }
    charts
}

fn summary_section(stats: &SummaryStats) -> SummarySection {
    let entries = vec![
        SummaryEntry {
            label: "Total products".to_string(),
            value: SummaryValue::Count(stats.count),
        },
        SummaryEntry {
            label: "Total inventory value".to_string(),
            value: SummaryValue::Amount(round_amount(stats.total_value)),
        },
        SummaryEntry {
            label: "Average unit price".to_string(),
            value: SummaryValue::Amount(round_amount(stats.avg_price)),
        },
        SummaryEntry {
            label: "Product with most stock".to_string(),
            value: SummaryValue::Text(stats.max_stock_product.clone()),
        },
        SummaryEntry {
            label: "Product with least stock".to_string(),
            value: SummaryValue::Text(stats.min_stock_product.clone()),
        },
    ];
    SummarySection {
        sheet: "Summary".to_string(),
        title: SUMMARY_TITLE.to_string(),
        entries,
    }
}

/// Rounds to two decimals, keeping the scale so `25` prints as `25.00`.
pub fn round_amount(value: f64) -> Decimal {
    let Some(amount) = Decimal::from_f64(value) else {
        warn!("Amount {value} is outside the decimal range; exporting it as 0.00");
        return Decimal::new(0, 2);
    };
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount
}

impl Report {
    pub fn to_document(&self, format: ManifestFormat) -> Result<String> {
        Ok(match format {
            ManifestFormat::Json => serde_json::to_string_pretty(self)?,
            ManifestFormat::Yaml => serde_yaml::to_string(self)?,
        })
    }

    /// Renders every section file as `(file name, bytes)`.
    pub fn render_files(&self, format: ManifestFormat) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = Vec::new();

        let inventory_rows = self
            .inventory
            .rows
            .iter()
            .map(|row| row.iter().map(CellValue::as_display).collect())
            .collect::<Vec<Vec<String>>>();
        files.push((
            "inventory.csv".to_string(),
            render_csv(&self.inventory.columns, &inventory_rows)?,
        ));

        let summary_rows = self
            .summary
            .entries
            .iter()
            .map(|entry| vec![entry.label.clone(), entry.value.as_display()])
            .collect::<Vec<_>>();
        files.push((
            "summary.csv".to_string(),
            render_csv(&["metric".to_string(), "value".to_string()], &summary_rows)?,
        ));

        for (idx, section) in self.pivots.iter().enumerate() {
            let (headers, rows) = section.to_rows();
            let name = if idx == 0 {
                "pivot.csv".to_string()
            } else {
                format!("pivot_{}.csv", idx + 1)
            };
            files.push((name, render_csv(&headers, &rows)?));
        }

        files.push((WORKBOOK_FILE.to_string(), workbook::render_workbook(self)?));
        files.push((
            format.file_name().to_string(),
            self.to_document(format)?.into_bytes(),
        ));
        Ok(files)
    }

    /// Writes all section files into `dir`, creating it when needed.
    pub fn write_to_dir(&self, dir: &Path, format: ManifestFormat) -> Result<Vec<PathBuf>> {
        let files = self.render_files(format)?;
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| InventoryError::Io { path, source }
        };
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let mut written = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(io_error(&path))?;
            written.push(path);
        }
        info!("Wrote {} report file(s) to {:?}", written.len(), dir);
        Ok(written)
    }
}

fn render_csv(headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| InventoryError::Export(format!("Flushing CSV section: {}", err.error())))
}
