//! Renders a [`Report`] as an xlsx workbook.
//!
//! Sheets follow the report sections: the itemized inventory with a banded
//! table and two charts, the summary, one sheet per pivot, and a hidden sheet
//! holding the chart series the charts point at.

use std::collections::HashSet;

use rust_xlsxwriter::{
    Chart, ChartType, ColNum, Format, FormatAlign, RowNum, Table, TableColumn, TableStyle,
    Workbook, Worksheet,
};

use crate::{
    aggregate::{Aggregation, Series},
    data::CellValue,
    error::{InventoryError, Result},
    report::{ChartKind, ChartSpec, PivotSection, Report, SummaryValue},
};

pub const CHART_DATA_SHEET: &str = "Chart Data";

/// Rows in an xlsx worksheet; valid zero-based indices stop one short.
const MAX_WORKBOOK_ROWS: usize = 1_048_576;
const SUMMARY_FIRST_ROW: RowNum = 3;
const SUMMARY_COLUMN_WIDTH: f64 = 40.0;
const PIVOT_FIRST_ROW: RowNum = 2;
const PIVOT_COLUMN_WIDTH: f64 = 20.0;

/// Serializes the whole report into xlsx bytes.
pub fn render_workbook(report: &Report) -> Result<Vec<u8>> {
    ensure_rows_fit(report.inventory.table.last_row, report.inventory.rows.len())?;
    let mut workbook = Workbook::new();
    let title_format = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_align(FormatAlign::Center);
    let bold = Format::new().set_bold();

    write_inventory(&mut workbook, report, &title_format)?;
    write_summary(&mut workbook, report, &title_format, &bold)?;
    for section in &report.pivots {
        write_pivot(&mut workbook, section, &title_format)?;
    }
    write_chart_data(&mut workbook, &report.inventory.charts)?;

    Ok(workbook.save_to_buffer()?)
}

fn ensure_rows_fit(last_row: usize, data_rows: usize) -> Result<()> {
    if last_row >= MAX_WORKBOOK_ROWS {
        return Err(InventoryError::Export(format!(
            "{data_rows} rows do not fit in a worksheet"
        )));
    }
    Ok(())
}

fn write_inventory(workbook: &mut Workbook, report: &Report, title_format: &Format) -> Result<()> {
    let section = &report.inventory;
    let sheet = workbook.add_worksheet().set_name(&section.sheet)?;

    let last_column = section.table.last_column.max(4) as ColNum;
    sheet.merge_range(0, 0, 0, last_column, &section.title, title_format)?;

    let header_row = section.table.first_row as RowNum;
    let headers = unique_table_headers(&section.columns);
    for (idx, header) in headers.iter().enumerate() {
        sheet.write_string(header_row, idx as ColNum, header)?;
    }
    for (row_idx, row) in section.rows.iter().enumerate() {
        let row_num = header_row + 1 + row_idx as RowNum;
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(sheet, row_num, col_idx as ColNum, cell)?;
        }
    }
    for (idx, width) in section.column_widths.iter().enumerate() {
        sheet.set_column_width(idx as ColNum, *width as f64)?;
    }

    if !headers.is_empty() {
        let columns = headers
            .iter()
            .map(|header| TableColumn::new().set_header(header))
            .collect::<Vec<_>>();
        let table = Table::new()
            .set_style(TableStyle::Medium9)
            .set_columns(&columns);
        // Excel tables need at least one data row.
        let last_row = (section.table.last_row as RowNum).max(header_row + 1);
        sheet.add_table(
            header_row,
            0,
            last_row,
            section.table.last_column as ColNum,
            &table,
        )?;
    }

    for (idx, spec) in section.charts.iter().enumerate() {
        let (row, col) = parse_anchor(&spec.anchor)?;
        sheet.insert_chart(row, col, &build_chart(spec, idx as ColNum * 2))?;
    }
    Ok(())
}

/// Table column names must differ ignoring case; repeats get `.1`, `.2` suffixes.
fn unique_table_headers(columns: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(columns.len());
    columns
        .iter()
        .map(|column| {
            let mut candidate = column.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.to_lowercase()) {
                candidate = format!("{column}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn write_cell(sheet: &mut Worksheet, row: RowNum, col: ColNum, cell: &CellValue) -> Result<()> {
    match cell {
        CellValue::Number(value) => {
            sheet.write_number(row, col, *value)?;
        }
        CellValue::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        CellValue::Empty => {}
    }
    Ok(())
}

fn build_chart(spec: &ChartSpec, data_column: ColNum) -> Chart {
    let mut chart = match spec.kind {
        ChartKind::Column => Chart::new(ChartType::Column),
        ChartKind::Pie => Chart::new(ChartType::Pie),
    };
    let last_row = spec.series.len().max(1) as RowNum;
    chart
        .add_series()
        .set_name(spec.title.as_str())
        .set_categories((CHART_DATA_SHEET, 1, data_column, last_row, data_column))
        .set_values((CHART_DATA_SHEET, 1, data_column + 1, last_row, data_column + 1));
    chart.title().set_name(spec.title.as_str());
    if let Some(name) = &spec.x_axis {
        chart.x_axis().set_name(name.as_str());
    }
    if let Some(name) = &spec.y_axis {
        chart.y_axis().set_name(name.as_str());
    }
    chart
}

fn write_summary(
    workbook: &mut Workbook,
    report: &Report,
    title_format: &Format,
    bold: &Format,
) -> Result<()> {
    let section = &report.summary;
    let sheet = workbook.add_worksheet().set_name(&section.sheet)?;
    sheet.merge_range(0, 0, 0, 1, &section.title, title_format)?;
    for (idx, entry) in section.entries.iter().enumerate() {
        let row = SUMMARY_FIRST_ROW + idx as RowNum;
        sheet.write_string_with_format(row, 0, &entry.label, bold)?;
        match &entry.value {
            SummaryValue::Count(count) => {
                sheet.write_number(row, 1, *count as f64)?;
            }
            SummaryValue::Amount(amount) => {
                sheet.write_number(row, 1, decimal_to_f64(amount))?;
            }
            SummaryValue::Text(Some(text)) => {
                sheet.write_string(row, 1, text)?;
            }
            SummaryValue::Text(None) => {}
        }
    }
    for col in 0..2 {
        sheet.set_column_width(col, SUMMARY_COLUMN_WIDTH)?;
    }
    Ok(())
}

fn decimal_to_f64(amount: &rust_decimal::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    amount.to_f64().unwrap_or_default()
}

fn write_pivot(
    workbook: &mut Workbook,
    section: &PivotSection,
    title_format: &Format,
) -> Result<()> {
    let sheet = workbook.add_worksheet().set_name(&section.sheet)?;
    let (headers, body): (Vec<&str>, Vec<(&str, Vec<f64>)>) = match &section.body {
        Aggregation::TwoDimensional(pivot) => (
            std::iter::once(pivot.row_field.label())
                .chain(pivot.columns.iter().map(String::as_str))
                .collect(),
            pivot
                .rows
                .iter()
                .map(String::as_str)
                .zip(pivot.cells.iter().cloned())
                .collect(),
        ),
        Aggregation::OneDimensional(series) => (
            vec![series.key.label(), series.measure.label()],
            series
                .entries
                .iter()
                .map(|entry| (entry.label.as_str(), vec![entry.value]))
                .collect(),
        ),
        Aggregation::Unavailable { .. } => {
            sheet.write_string(0, 0, section.note.as_deref().unwrap_or_default())?;
            return Ok(());
        }
    };

    let last_column = headers.len().saturating_sub(1).max(1) as ColNum;
    sheet.merge_range(0, 0, 0, last_column, &section.title, title_format)?;
    for (idx, header) in headers.iter().enumerate() {
        sheet.write_string(PIVOT_FIRST_ROW, idx as ColNum, *header)?;
    }
    for (row_idx, (label, values)) in body.iter().enumerate() {
        let row = PIVOT_FIRST_ROW + 1 + row_idx as RowNum;
        sheet.write_string(row, 0, *label)?;
        for (col_idx, value) in values.iter().enumerate() {
            sheet.write_number(row, 1 + col_idx as ColNum, *value)?;
        }
    }
    for col in 0..headers.len() {
        sheet.set_column_width(col as ColNum, PIVOT_COLUMN_WIDTH)?;
    }
    Ok(())
}

fn write_chart_data(workbook: &mut Workbook, charts: &[ChartSpec]) -> Result<()> {
    let sheet = workbook.add_worksheet().set_name(CHART_DATA_SHEET)?;
    for (idx, spec) in charts.iter().enumerate() {
        write_series(sheet, idx as ColNum * 2, &spec.series)?;
    }
    sheet.set_hidden(true);
    Ok(())
}

fn write_series(sheet: &mut Worksheet, col: ColNum, series: &Series) -> Result<()> {
    sheet.write_string(0, col, series.key.label())?;
    sheet.write_string(0, col + 1, series.measure.label())?;
    for (idx, entry) in series.entries.iter().enumerate() {
        let row = 1 + idx as RowNum;
        sheet.write_string(row, col, &entry.label)?;
        sheet.write_number(row, col + 1, entry.value)?;
    }
    Ok(())
}

/// Converts an `A1`-style anchor into zero-based `(row, column)`.
pub fn parse_anchor(anchor: &str) -> Result<(RowNum, ColNum)> {
    let invalid = || InventoryError::Export(format!("Invalid cell anchor '{anchor}'"));
    let split = anchor
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = anchor.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid());
    }
    let column = letters
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row = digits.parse::<RowNum>().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }
    let column = ColNum::try_from(column - 1).map_err(|_| invalid())?;
    Ok((row - 1, column))
}
