use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_weighting::*;

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::weighting::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name:?} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("The Excel file {path} has no worksheet or no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV data"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error reading JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Cannot find the directory of {path}"))]
    MissingParentDir { path: String },
    #[snafu(display("Invalid data in {path}: {source}"))]
    InvalidDataset {
        source: ValidationError,
        path: String,
    },
    #[snafu(display("Weighting failed: {source}"))]
    Weighting { source: ValidationError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, CliError>;

fn fmt_proportion(x: f64) -> JSValue {
    json!(format!("{:.6}", x))
}

fn balance_to_json(balance: &[VariableBalance]) -> JSMap<String, JSValue> {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for vb in balance.iter() {
        let rows: Vec<JSValue> = vb
            .rows
            .iter()
            .map(|r| {
                json!({
                    "category": r.category,
                    "target": fmt_proportion(r.target),
                    "weighted": fmt_proportion(r.weighted),
                    "absDiff": fmt_proportion(r.abs_diff),
                })
            })
            .collect();
        res.insert(vb.variable.clone(), json!(rows));
    }
    res
}

fn build_summary_js(config: &RunConfig, result: &WeightingResult) -> JSValue {
    let convergence: Vec<JSValue> = result
        .convergence
        .iter()
        .map(|vc| {
            json!({
                "variable": vc.variable,
                "iterations": vc.iterations,
                "converged": vc.converged,
            })
        })
        .collect();
    let warnings: Vec<JSValue> = result
        .warnings
        .iter()
        .map(|w| json!({"variables": w.variables, "missing": w.missing}))
        .collect();
    json!({
        "config": {
            "method": result.method.name(),
            "strata": config.strata,
            "countColumn": config.target_source.count_column,
            "weightColumn": result.weight_column,
            "rows": result.weights.len(),
        },
        "convergence": convergence,
        "balance": balance_to_json(&result.balance),
        "warnings": warnings,
    })
}

fn read_dataset(source: &FileSource, role: DatasetRole) -> CliResult<Dataset> {
    let provider = match source.provider.as_deref() {
        Some(p) => p.to_string(),
        None => io_common::infer_provider(&source.file_path).to_string(),
    };
    info!(
        "Reading {} data from {:?} (provider: {})",
        role, source.file_path, provider
    );
    let ds = match provider.as_str() {
        "csv" => io_csv::read_csv_dataset(&source.file_path)?,
        "excel" | "xlsx" => io_excel::read_excel_dataset(
            &source.file_path,
            source.excel_worksheet_name.as_deref(),
        )?,
        x => whatever!("Provider not implemented {:?}", x),
    };
    debug!(
        "read_dataset: {}: {} rows, columns: {:?}",
        io_common::simplify_file_name(&source.file_path),
        ds.len(),
        ds.columns()
    );
    Ok(ds)
}

/// Reads both datasets and computes the weights.
pub fn run_config(config: &RunConfig) -> CliResult<(WeightingResult, JSValue)> {
    info!("config: {:?}", config);
    let rules = config.weighting_rules()?;
    let sample = read_dataset(&config.sample_source, DatasetRole::Sample)?;
    let target = read_dataset(&config.target_source, DatasetRole::Target)?;

    let result = apply_weights(
        &sample,
        &target,
        &config.strata,
        config.target_source.count_column.as_deref(),
        &rules,
    )
    .context(WeightingSnafu {})?;

    if !result.converged() {
        warn!("Raking did not converge for every variable, see the summary for details");
    }

    let summary = build_summary_js(config, &result);
    Ok((result, summary))
}

fn write_to(dest: &str, contents: &str) -> CliResult<()> {
    if io_common::is_stdout(dest) {
        println!("{}", contents);
        Ok(())
    } else {
        fs::write(dest, contents).context(WritingOutputSnafu { path: dest })
    }
}

fn write_dataset(dest: Option<&str>, ds: &Dataset) -> CliResult<()> {
    match dest {
        Some(path) if !io_common::is_stdout(path) => {
            info!("Writing weighted sample to {:?}", path);
            let f = fs::File::create(path).context(WritingOutputSnafu { path })?;
            io_csv::write_csv_dataset(ds, f)
        }
        _ => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            io_csv::write_csv_dataset(ds, &mut lock)?;
            lock.flush().context(WritingOutputSnafu { path: "stdout" })
        }
    }
}

/// Compares a summary with a reference summary. Differences are printed and
/// turned into an error.
pub fn check_reference(summary: &JSValue, reference_path: &str) -> CliResult<()> {
    let pretty_js_summary = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_summary {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_summary.as_ref(),
            "\n",
        );
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("The summary matches the reference {:?}", reference_path);
    Ok(())
}

/// Entry point of the command line: assembles the configuration from the
/// optional configuration file and the arguments, then writes the outputs.
pub fn run(args: &Args) -> CliResult<()> {
    let config = assemble_config(args)?;
    let (result, summary) = run_config(&config)?;

    let output_settings = config.output_settings.clone().unwrap_or_default();
    write_dataset(output_settings.output_path.as_deref(), &result.dataset)?;

    let pretty_js_summary = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
    match output_settings.summary_path.as_deref() {
        Some(dest) if !dest.is_empty() => write_to(dest, &pretty_js_summary)?,
        _ => info!("summary: {}", pretty_js_summary),
    }

    if let Some(reference_path) = args.reference.as_deref() {
        check_reference(&summary, reference_path)?;
    }
    Ok(())
}

fn assemble_config(args: &Args) -> CliResult<RunConfig> {
    let from_file: Option<RunConfig> = match args.config.as_deref() {
        Some(config_path) => {
            let root = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu { path: config_path })?;
            Some(read_config(config_path)?.resolved(root))
        }
        None => None,
    };

    let mut config = match from_file {
        Some(c) => c,
        None => {
            let sample = args.sample.clone().whatever_context(
                "No sample provided: use --sample or a configuration file with --config",
            )?;
            let target = args.target.clone().whatever_context(
                "No target provided: use --target or a configuration file with --config",
            )?;
            RunConfig::from_paths(sample, target)
        }
    };
    config.apply_args(args);

    if config.strata.is_empty() {
        whatever!("No stratification variable provided: use --strata");
    }
    Ok(config)
}

#[cfg(test)]
fn run_weighting_test(test_name: &str) -> CliResult<()> {
    let test_dir = format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), test_name);
    info!("Running test {}", test_name);
    let config_path = format!("{}/config.json", test_dir);
    let root = Path::new(&test_dir);
    let config = read_config(&config_path)?.resolved(root);
    let (_, summary) = run_config(&config)?;
    check_reference(&summary, &format!("{}/expected_summary.json", test_dir))
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    if let Err(e) = run_weighting_test(test_name) {
        warn!("Error occured {:?}", e);
        if let Some(bt) = snafu::ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn poststrat_counts() {
        test_wrapper("poststrat_counts");
    }

    #[test]
    fn rake_two_way() {
        test_wrapper("rake_two_way");
    }

    #[test]
    fn rake_missing_category() {
        test_wrapper("rake_missing_category");
    }

    #[test]
    fn unknown_method_fails_before_reading() {
        let test_dir = format!("{}/tests/data/poststrat_counts", env!("CARGO_MANIFEST_DIR"));
        let mut config = read_config(&format!("{}/config.json", test_dir))
            .unwrap()
            .resolved(Path::new(&test_dir));
        config.sample_source.file_path = "does_not_exist.csv".to_string();
        if let Some(rules) = config.rules.as_mut() {
            rules.method = Some("bogus".to_string());
        }
        let res = run_config(&config);
        assert!(matches!(
            res,
            Err(CliError::Weighting {
                source: ValidationError::UnknownMethod(_)
            })
        ));
    }

    #[test]
    fn missing_stratum_column_is_reported() {
        let test_dir = format!("{}/tests/data/poststrat_counts", env!("CARGO_MANIFEST_DIR"));
        let mut config = read_config(&format!("{}/config.json", test_dir))
            .unwrap()
            .resolved(Path::new(&test_dir));
        config.strata = vec!["age".to_string()];
        let res = run_config(&config);
        assert!(matches!(
            res,
            Err(CliError::Weighting {
                source: ValidationError::MissingColumn { .. }
            })
        ));
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let test_dir = format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"));
        let config = read_config(&format!("{}/rake_two_way/config.json", test_dir))
            .unwrap()
            .resolved(Path::new(&format!("{}/rake_two_way", test_dir)));
        let (_, summary) = run_config(&config).unwrap();
        let other = format!("{}/poststrat_counts/expected_summary.json", test_dir);
        assert!(check_reference(&summary, &other).is_err());
    }
}
