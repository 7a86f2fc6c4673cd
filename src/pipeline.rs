//! End-to-end composition: parse, normalize, validate, derive, aggregate.
//!
//! Structural failures (unreadable input, missing required columns) abort
//! before anything is derived. Cell-level problems never abort.

use std::path::Path;

use log::{debug, info};

use crate::{
    aggregate::{self, Aggregation, CHART_TOP_N},
    error::Result,
    io_utils::{self, InputFormat},
    metrics::{self, EnrichedTable, SummaryStats},
    normalize::{self, DetectionMap, NormalizedTable},
    raw::{LoadOptions, RawTable},
    report::{self, Report, ReportInputs, ReportMetadata},
    synonyms::SynonymDictionary,
    validate::{self, REQUIRED_FIELDS, Validation},
};

/// Per-run knobs shared by every subcommand.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub format: Option<InputFormat>,
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
    pub sheet: Option<String>,
    pub categories: Vec<String>,
    pub chart_top: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimiter: None,
            encoding: None,
            sheet: None,
            categories: Vec::new(),
            chart_top: CHART_TOP_N,
        }
    }
}

/// Raw input plus the detection outcome, before any validation.
#[derive(Debug)]
pub struct Detection {
    pub normalized: NormalizedTable,
    pub validation: Validation,
}

impl Detection {
    pub fn map(&self) -> &DetectionMap {
        self.normalized.detection()
    }
}

/// Everything computed from one usable input.
#[derive(Debug)]
pub struct Analysis {
    pub normalized: NormalizedTable,
    pub enriched: EnrichedTable,
    /// `enriched` restricted to the requested categories.
    pub itemized: EnrichedTable,
    pub stats: SummaryStats,
    pub pivot: Aggregation,
}

pub fn load(path: &Path, bytes: &[u8], options: &RunOptions) -> Result<RawTable> {
    let format = InputFormat::resolve(options.format, path, bytes)?;
    debug!("Reading {path:?} as {format:?}");
    let load_options = LoadOptions {
        format,
        delimiter: options.delimiter,
        encoding: io_utils::resolve_encoding(options.encoding.as_deref())?,
        sheet: options.sheet.clone(),
    };
    RawTable::from_bytes(bytes, &load_options)
}

pub fn detect(raw: &RawTable, dictionary: &SynonymDictionary) -> Detection {
    let normalized = normalize::normalize(raw, dictionary);
    let validation = validate::validate(normalized.detection(), &REQUIRED_FIELDS);
    Detection {
        normalized,
        validation,
    }
}

pub fn analyze(
    raw: &RawTable,
    dictionary: &SynonymDictionary,
    options: &RunOptions,
) -> Result<Analysis> {
    let Detection {
        normalized,
        validation,
    } = detect(raw, dictionary);
    validation.into_result(dictionary)?;

    let (enriched, stats) = metrics::derive(&normalized)?;
    let itemized = enriched.filter_categories(&options.categories);
    let pivot = aggregate::best_pivot(&enriched);
    info!(
        "Derived {} row(s); total value {:.2}",
        stats.count, stats.total_value
    );
    Ok(Analysis {
        normalized,
        enriched,
        itemized,
        stats,
        pivot,
    })
}

pub fn build_report(
    source: &str,
    bytes: &[u8],
    analysis: &Analysis,
    options: &RunOptions,
) -> Report {
    let mut metadata = ReportMetadata::new(
        source,
        bytes,
        analysis.normalized.detection().clone(),
        analysis.normalized.unmapped().to_vec(),
    );
    metadata.category_filter = options.categories.clone();
    report::assemble(ReportInputs {
        itemized: &analysis.itemized,
        stats: &analysis.stats,
        pivots: std::slice::from_ref(&analysis.pivot),
        metadata,
        chart_top: options.chart_top,
    })
}

/// Reads `path` and runs every stage, returning the assembled report.
pub fn run_file(
    path: &Path,
    dictionary: &SynonymDictionary,
    options: &RunOptions,
) -> Result<Report> {
    let bytes = io_utils::read_input_bytes(path)?;
    let raw = load(path, &bytes, options)?;
    let analysis = analyze(&raw, dictionary, options)?;
    Ok(build_report(&source_name(path), &bytes, &analysis, options))
}

pub fn source_name(path: &Path) -> String {
    if io_utils::is_dash(path) {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;

    fn csv_options() -> RunOptions {
        RunOptions {
            format: Some(InputFormat::Csv),
            ..RunOptions::default()
        }
    }

    #[test]
    fn analyze_rejects_before_deriving() {
        let raw = load(Path::new("-"), b"Comments\nloose\n", &csv_options()).expect("load");
        let err = analyze(&raw, &SynonymDictionary::default(), &csv_options())
            .expect_err("missing fields");
        let InventoryError::MissingFields { missing, .. } = err else {
            panic!("expected missing fields");
        };
        assert_eq!(missing.len(), 3);
    }

    #[test]
    fn category_filter_leaves_statistics_and_pivot_untouched() {
        let bytes = b"Producto,Categoria,Cantidad,Precio\nA,Tools,2,3\nB,Paint,1,4\n";
        let options = RunOptions {
            categories: vec!["Paint".to_string()],
            ..csv_options()
        };
        let raw = load(Path::new("stock.csv"), bytes, &options).expect("load");
        let analysis = analyze(&raw, &SynonymDictionary::default(), &options).expect("analyze");
        assert_eq!(analysis.itemized.row_count(), 1);
        assert_eq!(analysis.stats.count, 2);
        assert_eq!(analysis.stats.total_value, 10.0);
        let Aggregation::OneDimensional(series) = &analysis.pivot else {
            panic!("expected category series");
        };
        assert_eq!(series.len(), 2);

        let report = build_report("stock.csv", bytes, &analysis, &options);
        assert_eq!(report.inventory.rows.len(), 1);
        assert_eq!(report.metadata.category_filter, ["Paint"]);
    }

    #[test]
    fn empty_table_still_produces_a_report() {
        let bytes = b"Product,Stock,Price\n";
        let raw = load(Path::new("empty.csv"), bytes, &csv_options()).expect("load");
        let analysis =
            analyze(&raw, &SynonymDictionary::default(), &csv_options()).expect("analyze");
        let report = build_report("empty.csv", bytes, &analysis, &csv_options());
        assert_eq!(report.summary.entries[0].value.as_display(), "0");
        assert!(report.pivots[0].note.is_some());
    }
}
