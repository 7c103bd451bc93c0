use clap::Parser;

/// This is a survey weighting program: it computes raking or post-stratification weights.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the weighting run.
    /// The other options override the values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference summary in JSON format. If provided, svweight will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path) The sample to weight, with a header row.
    #[clap(short, long, value_parser)]
    pub sample: Option<String>,

    /// (file path) The target population, with a header row. It can hold individual records
    /// or pre-aggregated counts (see --count-column).
    #[clap(short, long, value_parser)]
    pub target: Option<String>,

    /// (default: from the file extension, else csv) The type of the inputs: csv or excel.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (repeatable) A stratification variable. For raking, the order of the variables matters.
    #[clap(long, value_parser)]
    pub strata: Option<Vec<String>>,

    /// (default rake) The weighting method: rake or poststratify.
    #[clap(short, long, value_parser)]
    pub method: Option<String>,

    /// (column name or not specified) The column of the target holding pre-aggregated counts.
    #[clap(long, value_parser)]
    pub count_column: Option<String>,

    /// (default 20) The iteration budget of each raked variable.
    #[clap(long, value_parser)]
    pub max_iterations: Option<u32>,

    /// (default 1e-6) The largest weight change of a stable raking step.
    #[clap(long, value_parser)]
    pub tolerance: Option<f64>,

    /// (default 10) Weights are capped at this multiple of their mean. 0 or less disables the cap.
    #[clap(long, value_parser)]
    pub weight_cap: Option<f64>,

    /// (default zero) Post-stratification only: what rows get when their cell is not
    /// in the target. One of zero, unadjusted, fail.
    #[clap(long, value_parser)]
    pub unmatched: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet
    /// to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the weighted sample, in CSV format.
    /// Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be written in
    /// JSON format to the given location.
    #[clap(long, value_parser)]
    pub summary: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
