// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

/// One category of a stratification variable, or one joint cell.
///
/// It holds the values of the stratification columns, in the order of the
/// strata. For a single variable, it has exactly one element.
pub type Category = Vec<String>;

/// The two reweighting algorithms.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum WeightingMethod {
    /// Iterative proportional fitting over the marginal of each variable, in turn.
    Rake,
    /// One adjustment factor per joint cell of all the variables, in a single pass.
    PostStratify,
}

impl WeightingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            WeightingMethod::Rake => "rake",
            WeightingMethod::PostStratify => "poststratify",
        }
    }

    /// The column the weights are attached to, when the rules do not name one.
    pub fn default_column(&self) -> &'static str {
        match self {
            WeightingMethod::Rake => "rake_weights",
            WeightingMethod::PostStratify => "poststrat_weights",
        }
    }
}

impl FromStr for WeightingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<WeightingMethod, ValidationError> {
        match s {
            "rake" => Ok(WeightingMethod::Rake),
            "poststratify" | "poststrat" => Ok(WeightingMethod::PostStratify),
            x => Err(ValidationError::UnknownMethod(x.to_string())),
        }
    }
}

impl Display for WeightingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Upper bound applied to the weights after every adjustment step.
///
/// - MeanMultiple(m) clips every value above `m * mean(values)`. It bounds the
/// runaway growth caused by rare categories with large correction factors.
///
/// - Disabled leaves the values untouched.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum WeightCap {
    Disabled,
    MeanMultiple(f64),
}

impl WeightCap {
    pub(crate) fn apply(&self, values: &mut [f64]) {
        let multiple = match self {
            WeightCap::Disabled => return,
            WeightCap::MeanMultiple(m) => *m,
        };
        if values.is_empty() {
            return;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let cap = multiple * mean;
        for v in values.iter_mut() {
            if *v > cap {
                *v = cap;
            }
        }
    }
}

/// What a post-stratified row receives when its joint cell does not exist in
/// the target distribution.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnmatchedCellPolicy {
    /// The row gets a weight of zero.
    ZeroWeight,
    /// The row keeps its initial weight of one.
    Unadjusted,
    /// The whole call fails with `ValidationError::UnmatchedCell`.
    Fail,
}

impl FromStr for UnmatchedCellPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<UnmatchedCellPolicy, ValidationError> {
        match s {
            "zero" => Ok(UnmatchedCellPolicy::ZeroWeight),
            "unadjusted" => Ok(UnmatchedCellPolicy::Unadjusted),
            "fail" => Ok(UnmatchedCellPolicy::Fail),
            x => Err(ValidationError::InvalidRules(format!(
                "unknown unmatched cell policy {:?}",
                x
            ))),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct WeightingRules {
    pub method: WeightingMethod,
    /// Iteration budget, per stratification variable (raking only).
    pub max_iterations: u32,
    /// Maximum absolute change of any weight for a raking step to be stable.
    pub tolerance: f64,
    pub weight_cap: WeightCap,
    pub unmatched_cell_policy: UnmatchedCellPolicy,
    /// Name of the result column. If not provided, it depends on the method.
    pub weight_column: Option<String>,
}

impl WeightingRules {
    pub const DEFAULT_RULES: WeightingRules = WeightingRules {
        method: WeightingMethod::Rake,
        max_iterations: 20,
        tolerance: 1e-6,
        weight_cap: WeightCap::MeanMultiple(10.0),
        unmatched_cell_policy: UnmatchedCellPolicy::ZeroWeight,
        weight_column: None,
    };

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 {
            return Err(ValidationError::InvalidRules(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ValidationError::InvalidRules(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if let WeightCap::MeanMultiple(m) = self.weight_cap {
            if !m.is_finite() || m <= 0.0 {
                return Err(ValidationError::InvalidRules(format!(
                    "weight cap multiple must be a positive number, got {}",
                    m
                )));
            }
        }
        if let Some(c) = self.weight_column.as_deref() {
            if c.is_empty() {
                return Err(ValidationError::InvalidRules(
                    "weight column name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn result_column(&self) -> String {
        self.weight_column
            .clone()
            .unwrap_or_else(|| self.method.default_column().to_string())
    }
}

// ******** Output data structures *********

/// Categories (or joint cells) that exist in the target but not in the sample.
///
/// This is not fatal: these categories cannot receive any sample mass, so
/// they are simply not matched.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DataWarning {
    pub variables: Vec<String>,
    pub missing: Vec<Category>,
}

impl Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells: Vec<String> = self.missing.iter().map(|c| category_label(c)).collect();
        write!(
            f,
            "categories missing from the sample for {}: [{}]",
            self.variables.join(", "),
            cells.join(", ")
        )
    }
}

/// Convergence statistics for one raking variable.
#[derive(PartialEq, Debug, Clone)]
pub struct VariableConvergence {
    pub variable: String,
    /// Number of adjustment steps that were run, at most `max_iterations`.
    pub iterations: u32,
    pub converged: bool,
    /// The maximum absolute weight change during the last step.
    pub max_delta: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct BalanceRow {
    pub category: String,
    pub target: f64,
    pub weighted: f64,
    pub abs_diff: f64,
}

/// Target and weighted marginal distributions of one stratification variable.
#[derive(PartialEq, Debug, Clone)]
pub struct VariableBalance {
    pub variable: String,
    pub rows: Vec<BalanceRow>,
}

impl VariableBalance {
    pub fn max_abs_diff(&self) -> f64 {
        self.rows.iter().map(|r| r.abs_diff).fold(0.0, f64::max)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct WeightingResult {
    /// A copy of the sample, with the weight column attached.
    pub dataset: crate::Dataset,
    /// The weights, aligned with the rows of the sample.
    pub weights: Vec<f64>,
    pub weight_column: String,
    pub method: WeightingMethod,
    /// One entry per stratification variable when raking, empty otherwise.
    pub convergence: Vec<VariableConvergence>,
    pub warnings: Vec<DataWarning>,
    pub balance: Vec<VariableBalance>,
}

impl WeightingResult {
    pub fn converged(&self) -> bool {
        self.convergence.iter().all(|vc| vc.converged)
    }
}

/// The dataset an error refers to.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum DatasetRole {
    Sample,
    Target,
}

impl Display for DatasetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetRole::Sample => write!(f, "sample"),
            DatasetRole::Target => write!(f, "target"),
        }
    }
}

/// Errors that prevent a weighting call from starting or completing.
///
/// They describe malformed calls. Retrying with the same inputs fails the same way.
#[derive(PartialEq, Debug, Clone)]
pub enum ValidationError {
    UnknownMethod(String),
    MissingColumn {
        column: String,
        role: DatasetRole,
    },
    DuplicateColumn(String),
    RowShape {
        row: usize,
        expected: usize,
        got: usize,
    },
    LengthMismatch {
        expected: usize,
        got: usize,
    },
    InvalidCount {
        row: usize,
        column: String,
        value: String,
    },
    EmptyStrata,
    EmptyDataset(DatasetRole),
    ZeroTargetMass,
    InvalidRules(String),
    UnmatchedCell(Category),
}

impl Error for ValidationError {}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownMethod(m) => write!(
                f,
                "unknown weighting method {:?}, expected 'rake' or 'poststratify'",
                m
            ),
            ValidationError::MissingColumn { column, role } => {
                write!(f, "column {:?} is missing from the {} dataset", column, role)
            }
            ValidationError::DuplicateColumn(c) => write!(f, "duplicate column {:?}", c),
            ValidationError::RowShape { row, expected, got } => write!(
                f,
                "row {} has {} cells but the dataset has {} columns",
                row, got, expected
            ),
            ValidationError::LengthMismatch { expected, got } => {
                write!(f, "expected {} values, got {}", expected, got)
            }
            ValidationError::InvalidCount { row, column, value } => write!(
                f,
                "row {}: count column {:?} holds {:?}, which is not a non-negative number",
                row, column, value
            ),
            ValidationError::EmptyStrata => write!(f, "no stratification variable provided"),
            ValidationError::EmptyDataset(role) => write!(f, "the {} dataset has no rows", role),
            ValidationError::ZeroTargetMass => {
                write!(f, "the target dataset has a total mass of zero")
            }
            ValidationError::InvalidRules(msg) => write!(f, "invalid rules: {}", msg),
            ValidationError::UnmatchedCell(c) => write!(
                f,
                "sample cell {} does not exist in the target distribution",
                category_label(c)
            ),
        }
    }
}

/// Readable form of a category: the value itself for a single variable, a
/// tuple otherwise.
pub fn category_label(category: &[String]) -> String {
    match category {
        [single] => single.clone(),
        _ => format!("({})", category.join(", ")),
    }
}
