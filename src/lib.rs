pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod raw;
pub mod report;
pub mod summary;
pub mod synonyms;
pub mod table;
pub mod validate;
pub mod workbook;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs},
    synonyms::SynonymDictionary,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("inventory_report", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect(args) => handle_detect(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Report(args) => handle_report(&args),
        Commands::Synonyms(args) => handle_synonyms(&args),
    }
}

fn load_dictionary(path: Option<&Path>) -> Result<SynonymDictionary> {
    match path {
        Some(path) => {
            let dictionary = SynonymDictionary::load(path)
                .with_context(|| format!("Loading synonym dictionary from {path:?}"))?;
            debug!("Loaded synonym dictionary from {path:?}");
            Ok(dictionary)
        }
        None => Ok(SynonymDictionary::default()),
    }
}

fn load_input(
    args: &InputArgs,
    options: &pipeline::RunOptions,
) -> Result<(Vec<u8>, raw::RawTable)> {
    info!(
        "Reading '{}'{}",
        pipeline::source_name(&args.input),
        args.delimiter
            .map(|d| format!(" with delimiter '{}'", printable_delimiter(d)))
            .unwrap_or_default()
    );
    let bytes = io_utils::read_input_bytes(&args.input)
        .with_context(|| format!("Reading input {:?}", args.input))?;
    let raw = pipeline::load(&args.input, &bytes, options)
        .with_context(|| format!("Parsing {:?}", args.input))?;
    Ok((bytes, raw))
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    let dictionary = load_dictionary(args.input.synonyms.as_deref())?;
    let options = args.input.run_options(None);
    let (_, raw) = load_input(&args.input, &options)?;
    let detection = pipeline::detect(&raw, &dictionary);
    print!(
        "{}",
        summary::render_detection(
            detection.map(),
            detection.normalized.unmapped(),
            &detection.validation
        )
    );
    info!(
        "Detected {} of {} canonical field(s)",
        detection.map().len(),
        synonyms::CanonicalField::ALL.len()
    );
    if !detection.validation.is_usable() {
        warn!("Input cannot be summarized until the missing columns are provided");
    }
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let dictionary = load_dictionary(args.input.synonyms.as_deref())?;
    let options = args.input.run_options(Some(&args.view));
    let (_, raw) = load_input(&args.input, &options)?;
    let analysis = pipeline::analyze(&raw, &dictionary, &options)
        .with_context(|| format!("Analyzing {:?}", args.input.input))?;
    print!(
        "{}",
        summary::render_summary(&analysis, args.rows, options.chart_top)
    );
    Ok(())
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let dictionary = load_dictionary(args.input.synonyms.as_deref())?;
    let options = args.input.run_options(Some(&args.view));
    let (bytes, raw) = load_input(&args.input, &options)?;
    let analysis = pipeline::analyze(&raw, &dictionary, &options)
        .with_context(|| format!("Analyzing {:?}", args.input.input))?;
    let report = pipeline::build_report(
        &pipeline::source_name(&args.input.input),
        &bytes,
        &analysis,
        &options,
    );
    match &args.output {
        Some(dir) => {
            let written = report
                .write_to_dir(dir, args.manifest)
                .with_context(|| format!("Writing report to {dir:?}"))?;
            for path in written {
                println!("{}", path.display());
            }
        }
        None => {
            let document = report
                .to_document(args.manifest)
                .context("Serializing report")?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{document}").context("Writing report to stdout")?;
        }
    }
    Ok(())
}

fn handle_synonyms(args: &cli::SynonymsArgs) -> Result<()> {
    SynonymDictionary::default()
        .save(&args.output)
        .with_context(|| format!("Writing synonym dictionary to {:?}", args.output))?;
    info!("Default synonym dictionary written to {:?}", args.output);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
