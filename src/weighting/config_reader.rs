use crate::args::Args;
use crate::weighting::io_common::resolve_path;
use crate::weighting::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
    #[serde(rename = "weightColumn")]
    pub weight_column: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    // Only meaningful for the target.
    #[serde(rename = "countColumn")]
    pub count_column: Option<String>,
}

impl FileSource {
    fn from_path(file_path: String) -> FileSource {
        FileSource {
            provider: None,
            file_path,
            excel_worksheet_name: None,
            count_column: None,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunRules {
    pub method: Option<String>,
    #[serde(rename = "maxIterations")]
    pub max_iterations: Option<u32>,
    pub tolerance: Option<f64>,
    #[serde(rename = "weightCap")]
    pub weight_cap: Option<f64>,
    #[serde(rename = "unmatchedCellPolicy")]
    pub unmatched_cell_policy: Option<String>,
}

impl RunRules {
    /// Checks the rules, falling back to the library defaults for the missing values.
    pub fn validate(&self, weight_column: Option<String>) -> CliResult<WeightingRules> {
        let defaults = WeightingRules::DEFAULT_RULES;
        let res = WeightingRules {
            method: match self.method.as_deref() {
                Some(m) => m.parse::<WeightingMethod>().context(WeightingSnafu {})?,
                None => defaults.method,
            },
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            weight_cap: match self.weight_cap {
                Some(x) if x <= 0.0 => WeightCap::Disabled,
                Some(x) => WeightCap::MeanMultiple(x),
                None => defaults.weight_cap,
            },
            unmatched_cell_policy: match self.unmatched_cell_policy.as_deref() {
                Some(p) => p.parse::<UnmatchedCellPolicy>().context(WeightingSnafu {})?,
                None => defaults.unmatched_cell_policy,
            },
            weight_column,
        };
        res.validate().context(WeightingSnafu {})?;
        Ok(res)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "sampleSource")]
    pub sample_source: FileSource,
    #[serde(rename = "targetSource")]
    pub target_source: FileSource,
    #[serde(default)]
    pub strata: Vec<String>,
    pub rules: Option<RunRules>,
}

impl RunConfig {
    pub fn from_paths(sample: String, target: String) -> RunConfig {
        RunConfig {
            output_settings: None,
            sample_source: FileSource::from_path(sample),
            target_source: FileSource::from_path(target),
            strata: Vec::new(),
            rules: None,
        }
    }

    /// Makes the paths of the configuration relative to the given directory.
    pub fn resolved(mut self, root: &Path) -> RunConfig {
        self.sample_source.file_path = resolve_path(root, &self.sample_source.file_path);
        self.target_source.file_path = resolve_path(root, &self.target_source.file_path);
        if let Some(os) = self.output_settings.as_mut() {
            os.output_path = os.output_path.as_deref().map(|p| resolve_path(root, p));
            os.summary_path = os.summary_path.as_deref().map(|p| resolve_path(root, p));
        }
        self
    }

    /// Overrides the values of the configuration with the command line arguments.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(p) = args.sample.clone() {
            self.sample_source.file_path = p;
        }
        if let Some(p) = args.target.clone() {
            self.target_source.file_path = p;
        }
        if let Some(t) = args.input_type.clone() {
            self.sample_source.provider = Some(t.clone());
            self.target_source.provider = Some(t);
        }
        if let Some(ws) = args.excel_worksheet_name.clone() {
            self.sample_source.excel_worksheet_name = Some(ws.clone());
            self.target_source.excel_worksheet_name = Some(ws);
        }
        if let Some(c) = args.count_column.clone() {
            self.target_source.count_column = Some(c);
        }
        if let Some(strata) = args.strata.clone() {
            self.strata = strata;
        }

        let mut rules = self.rules.clone().unwrap_or_default();
        if let Some(m) = args.method.clone() {
            rules.method = Some(m);
        }
        if let Some(x) = args.max_iterations {
            rules.max_iterations = Some(x);
        }
        if let Some(x) = args.tolerance {
            rules.tolerance = Some(x);
        }
        if let Some(x) = args.weight_cap {
            rules.weight_cap = Some(x);
        }
        if let Some(p) = args.unmatched.clone() {
            rules.unmatched_cell_policy = Some(p);
        }
        self.rules = Some(rules);

        let mut os = self.output_settings.clone().unwrap_or_default();
        if let Some(o) = args.out.clone() {
            os.output_path = Some(o);
        }
        if let Some(s) = args.summary.clone() {
            os.summary_path = Some(s);
        }
        self.output_settings = Some(os);
    }

    pub fn weighting_rules(&self) -> CliResult<WeightingRules> {
        let weight_column = self
            .output_settings
            .as_ref()
            .and_then(|os| os.weight_column.clone())
            .filter(|c| !c.is_empty());
        self.rules
            .clone()
            .unwrap_or_default()
            .validate(weight_column)
    }
}

pub fn read_config(path: &str) -> CliResult<RunConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RunConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> CliResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_summary: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_config(s: &str) -> RunConfig {
        serde_json::from_str(s).unwrap()
    }

    const MINIMAL: &str = r#"{
        "sampleSource": {"filePath": "sample.csv"},
        "targetSource": {"provider": "csv", "filePath": "target.csv", "countColumn": "n"},
        "strata": ["region"]
    }"#;

    #[test]
    fn defaults_come_from_the_library() {
        let config = parse_config(MINIMAL);
        assert_eq!(config.weighting_rules().unwrap(), WeightingRules::DEFAULT_RULES);
        assert_eq!(config.target_source.count_column.as_deref(), Some("n"));
    }

    #[test]
    fn rules_are_read_and_checked() {
        let rules = RunRules {
            method: Some("poststrat".to_string()),
            weight_cap: Some(0.0),
            unmatched_cell_policy: Some("fail".to_string()),
            ..RunRules::default()
        };
        let r = rules.validate(Some("w".to_string())).unwrap();
        assert_eq!(r.method, WeightingMethod::PostStratify);
        assert_eq!(r.weight_cap, WeightCap::Disabled);
        assert_eq!(r.unmatched_cell_policy, UnmatchedCellPolicy::Fail);
        assert_eq!(r.result_column(), "w");

        let bad = RunRules {
            unmatched_cell_policy: Some("drop".to_string()),
            ..RunRules::default()
        };
        assert!(bad.validate(None).is_err());

        let bad = RunRules {
            max_iterations: Some(0),
            ..RunRules::default()
        };
        assert!(bad.validate(None).is_err());
    }

    #[test]
    fn arguments_override_the_file() {
        let mut config = parse_config(MINIMAL).resolved(Path::new("/data"));
        assert_eq!(config.sample_source.file_path, "/data/sample.csv");

        let args = Args::parse_from([
            "svweight",
            "--strata",
            "region",
            "--strata",
            "size",
            "--method",
            "poststratify",
            "--weight-cap",
            "5",
            "--out",
            "stdout",
        ]);
        config.apply_args(&args);
        assert_eq!(config.strata, vec!["region".to_string(), "size".to_string()]);
        assert_eq!(config.sample_source.file_path, "/data/sample.csv");
        let rules = config.weighting_rules().unwrap();
        assert_eq!(rules.method, WeightingMethod::PostStratify);
        assert_eq!(rules.weight_cap, WeightCap::MeanMultiple(5.0));
        assert_eq!(
            config.output_settings.unwrap().output_path.as_deref(),
            Some("stdout")
        );
    }
}
