use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of an incoming table.
///
/// CSV input only ever produces `Text` and `Empty`; spreadsheet input keeps
/// the native numeric type. Numeric meaning is applied later by [`coerce_number`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Builds a cell from raw text, treating whitespace-only input as blank.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Number(value) => format_number(*value),
            CellValue::Text(text) => text.clone(),
            CellValue::Empty => String::new(),
        }
    }

    /// Grouping key for aggregation; blank cells have no key.
    pub fn group_key(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.as_display().trim().to_string())
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Converts a cell to a number, or `None` when it has no numeric reading.
pub fn parse_number(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(value) => *value,
        CellValue::Text(text) => text.trim().parse::<f64>().ok()?,
        CellValue::Empty => return None,
    };
    value.is_finite().then_some(value)
}

/// Numeric coercion: anything that does not read as a finite number is zero.
pub fn coerce_number(cell: &CellValue) -> f64 {
    parse_number(cell).unwrap_or(0.0)
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Formats an amount with thousands separators and two decimals (`12,345.60`).
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}
