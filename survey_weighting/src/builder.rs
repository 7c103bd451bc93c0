pub use crate::config::*;
use crate::Dataset;

/// A builder for adding rows to a dataset.
///
/// ```
/// pub use survey_weighting::builder::DatasetBuilder;
/// # use survey_weighting::ValidationError;
///
/// let mut builder = DatasetBuilder::new(&["region".to_string(), "size".to_string()])?;
///
/// builder.add_row_simple(&["A", "S"])?;
/// builder.add_row(&["B", "L"], 3)?;
///
/// let sample = builder.build();
/// assert_eq!(sample.len(), 4);
///
/// # Ok::<(), ValidationError>(())
/// ```
pub struct DatasetBuilder {
    pub(crate) _dataset: Dataset,
}

impl DatasetBuilder {
    pub fn new(columns: &[String]) -> Result<DatasetBuilder, ValidationError> {
        Ok(DatasetBuilder {
            _dataset: Dataset::new(columns)?,
        })
    }

    /// Adds a single row.
    pub fn add_row_simple(&mut self, cells: &[&str]) -> Result<(), ValidationError> {
        self.add_row(cells, 1)
    }

    /// Adds the same row `count` times.
    ///
    /// Useful to describe a sample from its cell counts.
    pub fn add_row(&mut self, cells: &[&str], count: u32) -> Result<(), ValidationError> {
        let row: Vec<String> = cells.iter().map(|s| s.to_string()).collect();
        for _ in 0..count {
            self._dataset.push_row(row.clone())?;
        }
        Ok(())
    }

    pub fn build(self) -> Dataset {
        self._dataset
    }
}

/// A builder for a weighting run.
///
/// The method can be given by name, which is how callers that receive it as
/// user input should set it: unknown names fail before anything is computed.
///
/// ```
/// pub use survey_weighting::builder::{Builder, DatasetBuilder};
/// pub use survey_weighting::WeightingRules;
/// # use survey_weighting::ValidationError;
///
/// let cols = ["region".to_string()];
/// let mut sample = DatasetBuilder::new(&cols)?;
/// sample.add_row(&["A"], 60)?;
/// sample.add_row(&["B"], 40)?;
/// let mut target = DatasetBuilder::new(&cols)?;
/// target.add_row(&["A"], 1)?;
/// target.add_row(&["B"], 1)?;
///
/// let result = Builder::new(&WeightingRules::DEFAULT_RULES)?
///     .strata(&cols)?
///     .method("poststratify")?
///     .run(&sample.build(), &target.build())?;
///
/// assert_eq!(result.weight_column, "poststrat_weights");
/// assert!((result.weights[0] - 0.5 / 0.6).abs() < 1e-12);
///
/// assert!(Builder::new(&WeightingRules::DEFAULT_RULES)?.method("bogus").is_err());
///
/// # Ok::<(), ValidationError>(())
/// ```
pub struct Builder {
    pub(crate) _rules: WeightingRules,
    pub(crate) _strata: Vec<String>,
    pub(crate) _count_column: Option<String>,
}

impl Builder {
    pub fn new(rules: &WeightingRules) -> Result<Builder, ValidationError> {
        rules.validate()?;
        Ok(Builder {
            _rules: rules.clone(),
            _strata: Vec::new(),
            _count_column: None,
        })
    }

    pub fn strata(self, strata: &[String]) -> Result<Builder, ValidationError> {
        if strata.is_empty() {
            return Err(ValidationError::EmptyStrata);
        }
        Ok(Builder {
            _strata: strata.to_vec(),
            ..self
        })
    }

    pub fn method(mut self, name: &str) -> Result<Builder, ValidationError> {
        self._rules.method = name.parse::<WeightingMethod>()?;
        Ok(self)
    }

    /// Derives the target distribution from a column of counts instead of
    /// counting target rows.
    pub fn count_column(mut self, column: &str) -> Builder {
        self._count_column = Some(column.to_string());
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Builder {
        self._rules.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Builder {
        self._rules.tolerance = tolerance;
        self
    }

    pub fn run(
        &self,
        sample: &Dataset,
        target: &Dataset,
    ) -> Result<WeightingResult, ValidationError> {
        crate::apply_weights(
            sample,
            target,
            &self._strata,
            self._count_column.as_deref(),
            &self._rules,
        )
    }
}
