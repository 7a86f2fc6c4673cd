//! I/O utilities for reading inventory input.
//!
//! - **Format resolution**: explicit `--format`, then file extension, then
//!   magic bytes (zip container for xlsx/xlsm/ods, OLE compound file for xls).
//! - **Delimiter resolution**: `.tsv` → tab, everything else → comma.
//! - **Encoding**: CSV bytes are decoded via `encoding_rs`, defaulting to UTF-8.
//! - **stdin**: the `-` path convention reads standard input.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{InventoryError, Result};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    Csv,
    Tsv,
    /// Any workbook calamine understands (xlsx, xlsm, xlsb, xls, ods).
    Excel,
}

impl InputFormat {
    pub fn from_extension(path: &Path) -> Option<Result<Self>> {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        let format = match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Ok(InputFormat::Csv),
            "tsv" | "tab" => Ok(InputFormat::Tsv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputFormat::Excel),
            other => Err(InventoryError::UnsupportedFormat(other.to_string())),
        };
        Some(format)
    }

    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            InputFormat::Excel
        } else {
            InputFormat::Csv
        }
    }

    /// Explicit choice wins, then the extension, then the content.
    pub fn resolve(provided: Option<Self>, path: &Path, bytes: &[u8]) -> Result<Self> {
        if let Some(format) = provided {
            return Ok(format);
        }
        if !is_dash(path)
            && let Some(format) = Self::from_extension(path)
        {
            return format;
        }
        Ok(Self::sniff(bytes))
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            InventoryError::Parse(format!("Unknown encoding '{value}'"))
        }),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(format: InputFormat, provided: Option<u8>) -> u8 {
    provided.unwrap_or(match format {
        InputFormat::Tsv => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Reads the whole input into memory; the pipeline works on a byte stream.
pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let io_error = |source: io::Error| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    };
    if is_dash(path) {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer).map_err(io_error)?;
        Ok(buffer)
    } else {
        fs::read(path).map_err(io_error)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(InventoryError::Parse(format!(
            "Failed to decode text with encoding {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn resolve_prefers_explicit_then_extension_then_content() {
        let xlsx_bytes = b"PK\x03\x04rest-of-zip";
        assert_eq!(
            InputFormat::resolve(Some(InputFormat::Tsv), Path::new("a.xlsx"), xlsx_bytes)
                .unwrap(),
            InputFormat::Tsv
        );
        assert_eq!(
            InputFormat::resolve(None, Path::new("stock.XLSX"), b"").unwrap(),
            InputFormat::Excel
        );
        assert_eq!(
            InputFormat::resolve(None, Path::new("-"), xlsx_bytes).unwrap(),
            InputFormat::Excel
        );
        assert_eq!(
            InputFormat::resolve(None, Path::new("stock"), b"a,b\n1,2\n").unwrap(),
            InputFormat::Csv
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = InputFormat::resolve(None, &PathBuf::from("stock.pdf"), b"")
            .expect_err("pdf unsupported");
        assert!(err.to_string().contains("Unsupported input format 'pdf'"));
    }

    #[test]
    fn delimiter_defaults_follow_format() {
        assert_eq!(resolve_delimiter(InputFormat::Tsv, None), b'\t');
        assert_eq!(resolve_delimiter(InputFormat::Csv, None), b',');
        assert_eq!(resolve_delimiter(InputFormat::Csv, Some(b';')), b';');
    }

    #[test]
    fn resolve_encoding_accepts_labels() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("latin1")).unwrap().name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
