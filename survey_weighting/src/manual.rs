/*!

This is the long-form manual for `survey_weighting` and `svweight`.

## Methods

Two methods are available, both comparing a sample to a target population
over a set of categorical stratification variables:
* `rake` Iterative proportional fitting, one marginal at a time
* `poststratify` (alias `poststrat`) One factor per joint cell, in a single pass

### `rake`

The weights start at 1. For each stratification variable, in order, the
weighted share of every category is computed and every row is multiplied by
the ratio between the target share and the current share of its category.
This step is repeated until no weight changes by more than the tolerance
(default `1e-6`) or until the iteration budget (default 20 per variable) is
exhausted. Running out of iterations is not an error: the convergence
statistics in the result say which variables converged.

Raking only needs the marginals of the target. When the stratification
variables are correlated in the sample, fitting a later variable can pull
the earlier marginals away from their targets, so the marginals are matched
approximately. The balance report shows by how much.

### `poststratify`

The rows are grouped by the joint value of all the stratification variables
(a cell). Every row gets the ratio between the target share of its cell and
the unweighted sample share of that cell. The weighted joint distribution then
matches the target exactly, for all the cells present in the sample.

Post-stratification needs every target cell to be observed in the sample. It
is a good choice with few variables and a large sample. Rows whose cell does not
exist in the target are handled by the `unmatchedCellPolicy` rule:

| policy       | effect                                     |
|--------------|--------------------------------------------|
| `zero`       | the row gets a weight of 0 (default)       |
| `unadjusted` | the row keeps a weight of 1                |
| `fail`       | the run stops with an error                |

## Rules common to both methods

- The adjustment factors are capped at 10 times their mean (`weightCap`). A
rare category with a large target share would otherwise get a huge weight.
A cap of 0 or less disables it.
- A category that exists in the target but not in the sample cannot receive
any mass. It is reported once, as a warning, and the other categories are
matched relative to each other.
- When raking with such a missing category, the target shares of the observed
categories sum to less than 1, so every step multiplies all the weights by
that sum. The relative shares stop changing after the first step, but the
absolute weights shrink geometrically and keep changing: the variable uses
its whole iteration budget and is reported as not converged. For example,
with a target of `A: 0.5, B: 0.3, C: 0.2` and no `C` in the sample, every
step after the first multiplies the weights by 0.8. Rescale the weights
afterwards if their total matters.
- A category that exists in the sample but not in the target gets a factor of 0
when raking.
- Categories are compared as exact strings: `A`, `a` and `A ` are three
different categories.

## Input formats

The sample and the target are tables with a header row. The following
formats are supported:
* `csv` Comma Separated Values, the first line is the header
* `excel` Excel (.xlsx) files. The first worksheet is used, unless
`excelWorksheetName` is given.

The target can be given either as individual records (one row per person),
or as pre-aggregated counts. In the latter case, `countColumn` names the
column with the counts:

```text
region,size,n
A,S,1200
A,L,800
B,S,450
```

## Configuration file

All the options of the command line can also be given in a JSON file, with
paths relative to the location of that file:

```text
{
  "outputSettings": {
    "outputPath": "weighted.csv",
    "summaryPath": "summary.json",
    "weightColumn": "w"
  },
  "sampleSource": { "provider": "csv", "filePath": "sample.csv" },
  "targetSource": { "provider": "csv", "filePath": "census.csv", "countColumn": "n" },
  "strata": ["region", "size"],
  "rules": {
    "method": "rake",
    "maxIterations": 20,
    "tolerance": 0.000001,
    "weightCap": 10,
    "unmatchedCellPolicy": "zero"
  }
}
```

Command line options override the values of the configuration file.

## Summary

The summary is a JSON document with the configuration of the run, the
convergence of every raked variable, the balance of every stratification
variable (target and weighted proportions, formatted with 6 decimals) and
the warnings.

*/
