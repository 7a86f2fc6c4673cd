use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    aggregate::CHART_TOP_N, io_utils::InputFormat, pipeline::RunOptions, report::ManifestFormat,
    summary::DEFAULT_PREVIEW_ROWS,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Detect inventory columns in a spreadsheet and build a stock report",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show which input columns were recognised as canonical fields
    Detect(DetectArgs),
    /// Print the summary view: preview, statistics, chart series and pivot
    Summary(SummaryArgs),
    /// Assemble the multi-section report as CSV sections plus a manifest
    Report(ReportArgs),
    /// Write the default synonym dictionary to a YAML file
    Synonyms(SynonymsArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input spreadsheet (csv, tsv, xlsx, xls, ods); use '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML synonym dictionary overriding the built-in one
    #[arg(long)]
    pub synonyms: Option<PathBuf>,
    /// Input format; detected from the extension or content when omitted
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Worksheet to read from a workbook (defaults to the first one)
    #[arg(long)]
    pub sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// Restrict the itemized rows to these Category values
    #[arg(long = "category", action = clap::ArgAction::Append)]
    pub categories: Vec<String>,
    /// Maximum slices kept in the value share chart
    #[arg(long = "chart-top", default_value_t = CHART_TOP_N)]
    pub chart_top: usize,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub view: ViewArgs,
    /// Number of rows to preview
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub view: ViewArgs,
    /// Directory for the section files (document printed to stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Manifest format
    #[arg(long, value_enum, default_value = "json")]
    pub manifest: ManifestFormat,
}

#[derive(Debug, Args)]
pub struct SynonymsArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl InputArgs {
    pub fn run_options(&self, view: Option<&ViewArgs>) -> RunOptions {
        let mut options = RunOptions {
            format: self.format,
            delimiter: self.delimiter,
            encoding: self.input_encoding.clone(),
            sheet: self.sheet.clone(),
            ..RunOptions::default()
        };
        if let Some(view) = view {
            options.categories = view
                .categories
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string())
                .collect();
            options.chart_top = view.chart_top;
        }
        options
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
