pub mod builder;
mod config;
mod dataset;
pub mod manual;
use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet};

pub use crate::config::*;
pub use crate::dataset::Dataset;

/// Proportions by category (or joint cell).
///
/// Only observed categories are present: an unobserved category has an
/// implicit proportion of zero.
pub type Distribution = BTreeMap<Category, f64>;

/// Per-category multiplicative factors, and the categories that could not be matched.
#[derive(PartialEq, Debug, Clone)]
pub struct Adjustment {
    /// One factor per target category. Categories without sample mass get 0.
    pub factors: BTreeMap<Category, f64>,
    /// Target categories with no sample mass.
    pub missing: Vec<Category>,
    /// Sample categories that do not exist in the target.
    pub unmatched: Vec<Category>,
}

impl Adjustment {
    /// The factor of a sample category. Categories unknown to the target get 0.
    pub fn factor(&self, category: &[String]) -> f64 {
        self.factors.get(category).cloned().unwrap_or(0.0)
    }
}

/// Computes the target distribution from a reference dataset.
///
/// Arguments:
/// * `reference` the reference (population) dataset
/// * `variables` one variable for a marginal distribution, several for the
/// distribution over their joint cells
/// * `count_column` if provided, each reference row weighs the value of this
/// column instead of 1
pub fn target_distribution(
    reference: &Dataset,
    variables: &[String],
    count_column: Option<&str>,
) -> Result<Distribution, ValidationError> {
    let indices = reference.column_indices(variables, DatasetRole::Target)?;
    let masses: Vec<f64> = match count_column {
        Some(c) => reference.counts(c, DatasetRole::Target)?,
        None => vec![1.0; reference.len()],
    };
    let keys = reference.keys(&indices);
    let dist = distribution_of(&keys, &masses);
    if dist.is_empty() {
        return Err(ValidationError::ZeroTargetMass);
    }
    debug!("target_distribution: {:?}: {:?}", variables, dist);
    Ok(dist)
}

/// Computes the share of the total weight that falls in each category of the sample.
pub fn weighted_distribution(
    sample: &Dataset,
    variables: &[String],
    weights: &[f64],
) -> Result<Distribution, ValidationError> {
    if weights.len() != sample.len() {
        return Err(ValidationError::LengthMismatch {
            expected: sample.len(),
            got: weights.len(),
        });
    }
    let indices = sample.column_indices(variables, DatasetRole::Sample)?;
    Ok(distribution_of(&sample.keys(&indices), weights))
}

// Groups the masses by key and normalizes them by their total.
// If the total is zero, no proportion is defined and the distribution is empty.
fn distribution_of(keys: &[Category], masses: &[f64]) -> Distribution {
    let mut sums: Distribution = BTreeMap::new();
    for (key, mass) in keys.iter().zip(masses.iter()) {
        let e = sums.entry(key.clone()).or_insert(0.0);
        *e += mass;
    }
    let total: f64 = sums.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return Distribution::new();
    }
    for v in sums.values_mut() {
        *v /= total;
    }
    sums
}

/// Computes the multiplicative factor that brings each category from its
/// current proportion to its target proportion.
///
/// Divisions by zero and any other non-finite ratio give a factor of 0: a
/// category without sample mass cannot be granted weight.
pub fn adjustment_factors(target: &Distribution, current: &Distribution) -> Adjustment {
    let mut factors: BTreeMap<Category, f64> = BTreeMap::new();
    let mut missing: Vec<Category> = Vec::new();
    for (cat, t) in target.iter() {
        let f = match current.get(cat) {
            Some(&c) if c > 0.0 => t / c,
            Some(_) => 0.0,
            None => {
                missing.push(cat.clone());
                0.0
            }
        };
        factors.insert(cat.clone(), if f.is_finite() { f } else { 0.0 });
    }
    let unmatched: Vec<Category> = current
        .keys()
        .filter(|cat| !target.contains_key(*cat))
        .cloned()
        .collect();
    Adjustment {
        factors,
        missing,
        unmatched,
    }
}

/// Reweights the sample so that its distribution over the strata matches the
/// target.
///
/// Arguments:
/// * `sample` the dataset to reweight. It is not modified, the result holds a copy.
/// * `target` the reference population
/// * `strata` the stratification variables. For raking, the order matters:
/// each variable is fit in turn.
/// * `count_column` an optional column of the target with pre-aggregated counts
/// * `rules` the method and its parameters
///
/// Raking fits one marginal at a time, and a later variable can partially
/// undo the fit of an earlier one when the variables are correlated. The
/// marginals are then only approximately matched, within the limits of the
/// tolerance and of the iteration budget. This is inherent to iterative
/// proportional fitting. Post-stratification matches the joint cells exactly,
/// at the cost of needing every cell in the sample.
pub fn apply_weights(
    sample: &Dataset,
    target: &Dataset,
    strata: &[String],
    count_column: Option<&str>,
    rules: &WeightingRules,
) -> Result<WeightingResult, ValidationError> {
    info!(
        "Weighting {:?} sample rows against {:?} target rows, strata: {:?}, rules: {:?}",
        sample.len(),
        target.len(),
        strata,
        rules
    );
    rules.validate()?;
    if strata.is_empty() {
        return Err(ValidationError::EmptyStrata);
    }
    sample.column_indices(strata, DatasetRole::Sample)?;
    target.column_indices(strata, DatasetRole::Target)?;
    if let Some(c) = count_column {
        target.column_indices(&[c.to_string()], DatasetRole::Target)?;
    }
    if sample.is_empty() {
        return Err(ValidationError::EmptyDataset(DatasetRole::Sample));
    }
    if target.is_empty() {
        return Err(ValidationError::EmptyDataset(DatasetRole::Target));
    }

    let (weights, convergence, warnings) = match rules.method {
        WeightingMethod::Rake => {
            let outcome = rake(sample, target, strata, count_column, rules)?;
            (outcome.weights, outcome.convergence, outcome.warnings)
        }
        WeightingMethod::PostStratify => {
            let (weights, warnings) = post_stratify(sample, target, strata, count_column, rules)?;
            (weights, Vec::new(), warnings)
        }
    };

    let balance = balance_report(sample, target, strata, count_column, &weights)?;
    let weight_column = rules.result_column();
    let dataset = sample.with_column(&weight_column, &weights)?;
    info!(
        "Weighting done: method: {}, column: {:?}, total weight: {:?}",
        rules.method,
        weight_column,
        weights.iter().sum::<f64>()
    );
    Ok(WeightingResult {
        dataset,
        weights,
        weight_column,
        method: rules.method,
        convergence,
        warnings,
        balance,
    })
}

struct RakeOutcome {
    weights: Vec<f64>,
    convergence: Vec<VariableConvergence>,
    warnings: Vec<DataWarning>,
}

/// Iterative proportional fitting.
///
/// The weights start at 1. Each variable, in order, gets up to
/// `max_iterations` adjustment steps, and moves on to the next variable as
/// soon as no weight changes by more than `tolerance`. Running out of
/// iterations is not an error, it is reported in the convergence statistics.
fn rake(
    sample: &Dataset,
    target: &Dataset,
    strata: &[String],
    count_column: Option<&str>,
    rules: &WeightingRules,
) -> Result<RakeOutcome, ValidationError> {
    // Compute all the targets first, so that a bad target fails before any work.
    let mut margins: Vec<(String, Vec<Category>, Distribution)> = Vec::new();
    for var in strata.iter() {
        let variables = vec![var.clone()];
        let target_dist = target_distribution(target, &variables, count_column)?;
        let indices = sample.column_indices(&variables, DatasetRole::Sample)?;
        margins.push((var.clone(), sample.keys(&indices), target_dist));
    }

    let mut weights: Vec<f64> = vec![1.0; sample.len()];
    let mut convergence: Vec<VariableConvergence> = Vec::new();
    let mut warnings: Vec<DataWarning> = Vec::new();

    for (var, keys, target_dist) in margins.iter() {
        // Taken from the rows: earlier variables may have left some categories without weight.
        let observed: BTreeSet<&Category> = keys.iter().collect();
        let missing: Vec<Category> = target_dist
            .keys()
            .filter(|cat| !observed.contains(cat))
            .cloned()
            .collect();
        if let Some(w) = missing_warning(&[var.clone()], missing) {
            warnings.push(w);
        }

        let mut stats = VariableConvergence {
            variable: var.clone(),
            iterations: 0,
            converged: false,
            max_delta: f64::INFINITY,
        };
        for iteration in 1..=rules.max_iterations {
            let current = distribution_of(keys, &weights);
            let adjustment = adjustment_factors(target_dist, &current);
            debug!(
                "rake: {:?} iteration {:?}: current: {:?} factors: {:?}",
                var, iteration, current, adjustment.factors
            );

            let mut new_weights: Vec<f64> = weights
                .iter()
                .zip(keys.iter())
                .map(|(w, k)| w * adjustment.factor(k))
                .collect();
            rules.weight_cap.apply(&mut new_weights);

            let max_delta = new_weights
                .iter()
                .zip(weights.iter())
                .map(|(n, o)| (n - o).abs())
                .fold(0.0, f64::max);
            weights = new_weights;
            stats.iterations = iteration;
            stats.max_delta = max_delta;
            if max_delta < rules.tolerance {
                stats.converged = true;
                break;
            }
        }
        if stats.converged {
            info!(
                "rake: {:?} converged after {:?} iterations",
                var, stats.iterations
            );
        } else {
            warn!(
                "rake: {:?} did not converge after {:?} iterations (last change: {:?})",
                var, stats.iterations, stats.max_delta
            );
        }
        convergence.push(stats);
    }

    Ok(RakeOutcome {
        weights,
        convergence,
        warnings,
    })
}

/// Single-pass reweighting over the joint cells of all the strata.
///
/// Every row gets the factor of its own cell as its final weight.
fn post_stratify(
    sample: &Dataset,
    target: &Dataset,
    strata: &[String],
    count_column: Option<&str>,
    rules: &WeightingRules,
) -> Result<(Vec<f64>, Vec<DataWarning>), ValidationError> {
    let target_dist = target_distribution(target, strata, count_column)?;
    let indices = sample.column_indices(strata, DatasetRole::Sample)?;
    let keys = sample.keys(&indices);
    let sample_dist = distribution_of(&keys, &vec![1.0; keys.len()]);

    let mut adjustment = adjustment_factors(&target_dist, &sample_dist);

    // The cap is computed over every cell seen on either side, the cells that
    // only exist in the sample counting as zero.
    let mut all_factors: Vec<f64> = adjustment.factors.values().cloned().collect();
    all_factors.extend(std::iter::repeat(0.0).take(adjustment.unmatched.len()));
    rules.weight_cap.apply(&mut all_factors);
    for (f, capped) in adjustment.factors.values_mut().zip(all_factors.iter()) {
        *f = *capped;
    }
    debug!("post_stratify: factors: {:?}", adjustment.factors);

    let mut warnings: Vec<DataWarning> = Vec::new();
    if let Some(w) = missing_warning(strata, adjustment.missing.clone()) {
        warnings.push(w);
    }
    if !adjustment.unmatched.is_empty() {
        debug!(
            "post_stratify: sample cells without target: {:?}, policy: {:?}",
            adjustment.unmatched, rules.unmatched_cell_policy
        );
    }

    let mut weights: Vec<f64> = Vec::with_capacity(keys.len());
    for k in keys.iter() {
        let w = match adjustment.factors.get(k) {
            Some(f) => *f,
            None => match rules.unmatched_cell_policy {
                UnmatchedCellPolicy::ZeroWeight => 0.0,
                UnmatchedCellPolicy::Unadjusted => 1.0,
                UnmatchedCellPolicy::Fail => {
                    return Err(ValidationError::UnmatchedCell(k.clone()));
                }
            },
        };
        weights.push(w);
    }
    Ok((weights, warnings))
}

fn missing_warning(variables: &[String], missing: Vec<Category>) -> Option<DataWarning> {
    if missing.is_empty() {
        return None;
    }
    let w = DataWarning {
        variables: variables.to_vec(),
        missing,
    };
    warn!("{}", w);
    Some(w)
}

/// Compares, for every stratification variable, the target marginal with the
/// weighted marginal of the sample.
///
/// The rows cover the categories of both sides and are sorted by category.
pub fn balance_report(
    sample: &Dataset,
    target: &Dataset,
    strata: &[String],
    count_column: Option<&str>,
    weights: &[f64],
) -> Result<Vec<VariableBalance>, ValidationError> {
    let mut res: Vec<VariableBalance> = Vec::new();
    for var in strata.iter() {
        let variables = vec![var.clone()];
        let target_dist = target_distribution(target, &variables, count_column)?;
        let weighted = weighted_distribution(sample, &variables, weights)?;
        let all_cats: BTreeSet<&Category> = target_dist.keys().chain(weighted.keys()).collect();
        let rows: Vec<BalanceRow> = all_cats
            .into_iter()
            .map(|cat| {
                let t = target_dist.get(cat).cloned().unwrap_or(0.0);
                let w = weighted.get(cat).cloned().unwrap_or(0.0);
                BalanceRow {
                    category: category_label(cat),
                    target: t,
                    weighted: w,
                    abs_diff: (t - w).abs(),
                }
            })
            .collect();
        res.push(VariableBalance {
            variable: var.clone(),
            rows,
        });
    }
    Ok(res)
}
