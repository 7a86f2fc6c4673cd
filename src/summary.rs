//! Terminal rendition of the interactive summary view.

use std::fmt::Write as _;

use crate::{
    aggregate::{self, Aggregation, Measure, Series, SortOrder},
    data::{CellValue, format_amount},
    metrics::SummaryStats,
    normalize::DetectionMap,
    pipeline::Analysis,
    synonyms::CanonicalField,
    table::{Align, render_aligned_table, render_key_values, render_table},
    validate::Validation,
};

pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Canonical field, source header, and status for every field.
pub fn render_detection(
    detection: &DetectionMap,
    unmapped: &[String],
    validation: &Validation,
) -> String {
    let headers = vec![
        "field".to_string(),
        "source column".to_string(),
        "status".to_string(),
    ];
    let rows = CanonicalField::ALL
        .iter()
        .map(|field| {
            let (source, status) = match detection.get(*field) {
                Some(header) => (header.to_string(), "detected"),
                None => (String::new(), "missing"),
            };
            vec![field.label().to_string(), source, status.to_string()]
        })
        .collect::<Vec<_>>();

    let mut output = render_table(&headers, &rows);
    let unmapped = if unmapped.is_empty() {
        "(none)".to_string()
    } else {
        unmapped.join(", ")
    };
    let _ = writeln!(output, "\nUnmapped columns: {unmapped}");
    let status = match validation {
        Validation::Usable => "usable".to_string(),
        Validation::Rejected { missing } => format!(
            "rejected (missing {})",
            missing.iter().map(|f| f.label()).collect::<Vec<_>>().join(", ")
        ),
    };
    let _ = writeln!(output, "Validation: {status}");
    output
}

pub fn render_stats(stats: &SummaryStats) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    render_key_values(&[
        ("Total products".to_string(), stats.count.to_string()),
        ("Total inventory value".to_string(), format_amount(stats.total_value)),
        ("Average unit price".to_string(), format_amount(stats.avg_price)),
        ("Product with most stock".to_string(), text(&stats.max_stock_product)),
        ("Product with least stock".to_string(), text(&stats.min_stock_product)),
    ])
}

pub fn render_series(series: &Series) -> String {
    let headers = vec![
        series.key.label().to_string(),
        series.measure.label().to_string(),
    ];
    let rows = series
        .entries
        .iter()
        .map(|entry| vec![entry.label.clone(), format_amount(entry.value)])
        .collect::<Vec<_>>();
    render_aligned_table(&headers, &rows, &[Align::Left, Align::Right])
}

pub fn render_aggregation(aggregation: &Aggregation) -> String {
    match aggregation {
        Aggregation::OneDimensional(series) => render_series(series),
        Aggregation::TwoDimensional(pivot) => {
            let mut headers = vec![pivot.row_field.label().to_string()];
            headers.extend(pivot.columns.iter().cloned());
            let rows = pivot
                .rows
                .iter()
                .zip(&pivot.cells)
                .map(|(label, cells)| {
                    let mut row = vec![label.clone()];
                    row.extend(cells.iter().map(|value| format_amount(*value)));
                    row
                })
                .collect::<Vec<_>>();
            let mut aligns = vec![Align::Left];
            aligns.resize(headers.len(), Align::Right);
            render_aligned_table(&headers, &rows, &aligns)
        }
        Aggregation::Unavailable { missing } => format!(
            "Pivot not available: {} column not detected.\n",
            missing.iter().map(|f| f.label()).collect::<Vec<_>>().join(" and ")
        ),
    }
}

/// Full summary view: detection, preview, statistics, chart series and pivot.
pub fn render_summary(analysis: &Analysis, preview_rows: usize, chart_top: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Detected columns");
    output.push_str(&render_detection(
        analysis.normalized.detection(),
        analysis.normalized.unmapped(),
        &Validation::Usable,
    ));

    let table = &analysis.itemized;
    let shown = preview_rows.min(table.row_count());
    let _ = writeln!(output, "\nPreview ({shown} of {} row(s))", table.row_count());
    let rows = table
        .rows()
        .iter()
        .take(preview_rows)
        .map(|row| row.iter().map(CellValue::as_display).collect())
        .collect::<Vec<Vec<String>>>();
    output.push_str(&render_table(table.headers(), &rows));

    let _ = writeln!(output, "\nSummary");
    output.push_str(&render_stats(&analysis.stats));

    if let Some(stock) = aggregate::group_sum(
        table,
        CanonicalField::Product,
        Measure::Stock,
        SortOrder::ValueDescending,
    ) {
        let _ = writeln!(output, "\nStock by Product");
        output.push_str(&render_series(&stock));
    }
    if let Some(value) = aggregate::group_sum(
        table,
        CanonicalField::Product,
        Measure::TotalValue,
        SortOrder::ValueDescending,
    ) {
        let top = value.top(chart_top);
        let _ = writeln!(
            output,
            "\nTotal Value by Product (top {} of {})",
            top.len(),
            value.len()
        );
        output.push_str(&render_series(&top));
    }

    let _ = writeln!(output, "\nPivot");
    output.push_str(&render_aggregation(&analysis.pivot));
    output
}
