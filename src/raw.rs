//! Loading the raw table from a byte stream.
//!
//! The first row always holds the headers. Nothing else about the layout is
//! assumed: header names are free text and are resolved later by the normalizer.

use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    data::{CellValue, format_number},
    error::{InventoryError, Result},
    io_utils::{self, InputFormat},
};

/// Rows of heterogeneous cells under an ordered list of raw headers.
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub format: InputFormat,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sheet: Option<String>,
}

impl LoadOptions {
    pub fn new(format: InputFormat) -> Self {
        Self {
            format,
            delimiter: None,
            encoding: encoding_rs::UTF_8,
            sheet: None,
        }
    }
}

impl RawTable {
    /// Builds a table, padding short rows with blanks and rejecting long ones.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let width = headers.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(InventoryError::Parse(format!(
                    "Row {} has {} cells but only {width} headers",
                    idx + 2,
                    row.len()
                )));
            }
            row.resize(width, CellValue::Empty);
            padded.push(row);
        }
        Ok(Self {
            headers: dedupe_headers(headers),
            rows: padded,
        })
    }

    pub fn from_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Self> {
        let table = match options.format {
            InputFormat::Csv | InputFormat::Tsv => {
                let delimiter = io_utils::resolve_delimiter(options.format, options.delimiter);
                parse_delimited(bytes, delimiter, options.encoding)?
            }
            InputFormat::Excel => parse_workbook(bytes, options.sheet.as_deref())?,
        };
        info!(
            "Loaded {} row(s) across {} column(s)",
            table.row_count(),
            table.headers.len()
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows already rectangular and headers already unique.
    pub(crate) fn from_parts(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }
}

fn parse_delimited(bytes: &[u8], delimiter: u8, encoding: &'static Encoding) -> Result<RawTable> {
    let mut reader = io_utils::open_csv_reader(bytes, delimiter);
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(InventoryError::Parse("Input has no header row".to_string()));
    }
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            InventoryError::Parse(format!("Reading row {}: {err}", row_idx + 2))
        })?;
        let decoded = io_utils::decode_record(&record, encoding)?;
        rows.push(decoded.iter().map(|s| CellValue::from_text(s)).collect());
    }
    RawTable::new(headers, rows)
}

fn parse_workbook(bytes: &[u8], sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(requested) => sheet_names
            .iter()
            .find(|name| name.as_str() == requested)
            .cloned()
            .ok_or_else(|| {
                InventoryError::Parse(format!(
                    "Sheet '{requested}' not found (available: {})",
                    sheet_names.join(", ")
                ))
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| InventoryError::Parse("Workbook has no sheets".to_string()))?,
    };
    debug!("Reading sheet '{name}'");
    let range = workbook.worksheet_range(&name)?;
    range_to_table(&range)
}

fn range_to_table(range: &Range<Data>) -> Result<RawTable> {
    let mut row_iter = range.rows();
    let header_row = row_iter
        .next()
        .ok_or_else(|| InventoryError::Parse("Sheet is empty".to_string()))?;
    let headers = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell_to_value(cell) {
            CellValue::Empty => format!("Unnamed: {idx}"),
            value => value.as_display().trim().to_string(),
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for row in row_iter {
        let values = row.iter().map(cell_to_value).collect::<Vec<_>>();
        if values.iter().all(CellValue::is_empty) {
            continue;
        }
        rows.push(values);
    }
    RawTable::new(headers, rows)
}

fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => CellValue::Text(parsed.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Text(format_number(dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(err) => CellValue::Text(format!("#ERR:{err:?}")),
    }
}

/// Blank headers become `Unnamed: <i>`; repeats get `.1`, `.2` suffixes.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}
