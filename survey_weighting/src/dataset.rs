use std::collections::HashSet;

use crate::config::{Category, DatasetRole, ValidationError};

/// An in-memory table: ordered column names and rows of text cells.
///
/// Categories are compared as exact strings. An empty cell is a category of
/// its own.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: &[String]) -> Result<Dataset, ValidationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for c in columns.iter() {
            if !seen.insert(c.as_str()) {
                return Err(ValidationError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Dataset {
            columns: columns.to_vec(),
            rows: Vec::new(),
        })
    }

    pub fn from_rows(
        columns: &[String],
        rows: Vec<Vec<String>>,
    ) -> Result<Dataset, ValidationError> {
        let mut ds = Dataset::new(columns)?;
        for row in rows {
            ds.push_row(row)?;
        }
        Ok(ds)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ValidationError> {
        if row.len() != self.columns.len() {
            return Err(ValidationError::RowShape {
                row: self.rows.len(),
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| r[idx].as_str()))
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// The positions of the given columns, failing on the first one that is absent.
    pub fn column_indices(
        &self,
        names: &[String],
        role: DatasetRole,
    ) -> Result<Vec<usize>, ValidationError> {
        names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| ValidationError::MissingColumn {
                        column: n.clone(),
                        role,
                    })
            })
            .collect()
    }

    /// Reads a column of pre-aggregated counts.
    ///
    /// Every cell must be a finite, non-negative number.
    pub fn counts(&self, name: &str, role: DatasetRole) -> Result<Vec<f64>, ValidationError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ValidationError::MissingColumn {
                column: name.to_string(),
                role,
            })?;
        let mut res: Vec<f64> = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let cell = row[idx].trim();
            match cell.parse::<f64>() {
                Ok(x) if x.is_finite() && x >= 0.0 => res.push(x),
                _ => {
                    return Err(ValidationError::InvalidCount {
                        row: row_idx,
                        column: name.to_string(),
                        value: cell.to_string(),
                    })
                }
            }
        }
        Ok(res)
    }

    /// The category of every row, over the columns at the given positions.
    pub(crate) fn keys(&self, indices: &[usize]) -> Vec<Category> {
        self.rows
            .iter()
            .map(|r| indices.iter().map(|&idx| r[idx].clone()).collect())
            .collect()
    }

    /// Returns a copy with a numeric column attached.
    ///
    /// If the column already exists, its values are replaced.
    pub fn with_column(&self, name: &str, values: &[f64]) -> Result<Dataset, ValidationError> {
        if values.len() != self.rows.len() {
            return Err(ValidationError::LengthMismatch {
                expected: self.rows.len(),
                got: values.len(),
            });
        }
        let mut res = self.clone();
        let cells = values.iter().map(|v| v.to_string());
        match self.column_index(name) {
            Some(idx) => {
                for (row, cell) in res.rows.iter_mut().zip(cells) {
                    row[idx] = cell;
                }
            }
            None => {
                res.columns.push(name.to_string());
                for (row, cell) in res.rows.iter_mut().zip(cells) {
                    row.push(cell);
                }
            }
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_duplicate_columns() {
        let res = Dataset::new(&names(&["region", "region"]));
        assert_eq!(
            res,
            Err(ValidationError::DuplicateColumn("region".to_string()))
        );
    }

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let mut ds = Dataset::new(&names(&["region", "size"])).unwrap();
        ds.push_row(names(&["A", "S"])).unwrap();
        let res = ds.push_row(names(&["B"]));
        assert_eq!(
            res,
            Err(ValidationError::RowShape {
                row: 1,
                expected: 2,
                got: 1
            })
        );
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn column_lookups() {
        let ds = Dataset::from_rows(
            &names(&["region", "size"]),
            vec![names(&["A", "S"]), names(&["B", "L"])],
        )
        .unwrap();
        let sizes: Vec<&str> = ds.column("size").unwrap().collect();
        assert_eq!(sizes, vec!["S", "L"]);
        assert!(ds.column("age").is_none());
        assert_eq!(ds.get(1, "region"), Some("B"));
        assert_eq!(
            ds.column_indices(&names(&["size", "age"]), DatasetRole::Target),
            Err(ValidationError::MissingColumn {
                column: "age".to_string(),
                role: DatasetRole::Target
            })
        );
    }

    #[test]
    fn counts_must_be_non_negative_numbers() {
        let ds = Dataset::from_rows(
            &names(&["region", "n"]),
            vec![names(&["A", " 12 "]), names(&["B", "3.5"])],
        )
        .unwrap();
        assert_eq!(ds.counts("n", DatasetRole::Target), Ok(vec![12.0, 3.5]));

        let bad = Dataset::from_rows(
            &names(&["region", "n"]),
            vec![names(&["A", "1"]), names(&["B", "-2"])],
        )
        .unwrap();
        assert_eq!(
            bad.counts("n", DatasetRole::Target),
            Err(ValidationError::InvalidCount {
                row: 1,
                column: "n".to_string(),
                value: "-2".to_string()
            })
        );
    }

    #[test]
    fn with_column_appends_then_replaces() {
        let ds = Dataset::from_rows(&names(&["region"]), vec![names(&["A"]), names(&["B"])])
            .unwrap();
        let w1 = ds.with_column("w", &[0.5, 1.25]).unwrap();
        assert_eq!(w1.columns(), &names(&["region", "w"])[..]);
        assert_eq!(w1.get(1, "w"), Some("1.25"));

        let w2 = w1.with_column("w", &[2.0, 3.0]).unwrap();
        assert_eq!(w2.columns().len(), 2);
        assert_eq!(w2.get(0, "w"), Some("2"));
        // The source dataset is left untouched.
        assert_eq!(ds.columns().len(), 1);

        assert_eq!(
            ds.with_column("w", &[1.0]),
            Err(ValidationError::LengthMismatch {
                expected: 2,
                got: 1
            })
        );
    }
}
