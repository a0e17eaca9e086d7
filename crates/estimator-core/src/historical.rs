//! Historical project record set
//!
//! A numeric table loaded from CSV, immutable after load and only ever
//! replaced wholesale by the lifecycle manager. Missing or unparsable
//! cells are imputed with the column median at load time. The only
//! consumer is the analogous-cost estimator, which needs the `Effort`
//! and `Transactions` columns.

use crate::error::{EstimatorError, Result};
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Column holding effort spent per historical project
pub const EFFORT_COLUMN: &str = "Effort";
/// Column holding the size/transaction count per historical project
pub const TRANSACTIONS_COLUMN: &str = "Transactions";

#[derive(Debug, Clone)]
struct Column {
    name: String,
    values: Vec<f64>,
}

/// Immutable historical record set
#[derive(Debug, Clone)]
pub struct HistoricalData {
    columns: Vec<Column>,
    rows: usize,
}

impl HistoricalData {
    /// Load from a CSV file. `NotFound` if the path is missing.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EstimatorError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| EstimatorError::HistoricalDataUnavailable(format!("csv header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // column-major parse; unparsable cells become None for imputation
        let mut raw: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
        let mut rows = 0usize;
        for record in rdr.records() {
            let record =
                record.map_err(|e| {
                    EstimatorError::HistoricalDataUnavailable(format!("csv row: {}", e))
                })?;
            for (i, cell) in record.iter().enumerate() {
                if i < raw.len() {
                    raw[i].push(cell.trim().parse::<f64>().ok().filter(|v| v.is_finite()));
                }
            }
            rows += 1;
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| {
                let median = median(cells.iter().filter_map(|v| *v));
                let fill = match median {
                    Some(m) => m,
                    None => {
                        if rows > 0 {
                            warn!(column = %name, "column has no numeric values, imputing 0");
                        }
                        0.0
                    }
                };
                Column {
                    name,
                    values: cells.into_iter().map(|v| v.unwrap_or(fill)).collect(),
                }
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Number of historical records
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Mean of `effort / transactions` over rows with nonzero transactions.
    ///
    /// Rows where the transactions value is zero are excluded from the
    /// mean entirely rather than contributing a zero unit cost. Returns
    /// `Ok(None)` when no row qualifies; the caller decides between the
    /// fallback constant and a hard error.
    pub fn mean_unit_cost(&self) -> Result<Option<f64>> {
        let effort = self.column(EFFORT_COLUMN).ok_or_else(|| {
            EstimatorError::HistoricalDataUnavailable(format!(
                "dataset missing {} column",
                EFFORT_COLUMN
            ))
        })?;
        let transactions = self.column(TRANSACTIONS_COLUMN).ok_or_else(|| {
            EstimatorError::HistoricalDataUnavailable(format!(
                "dataset missing {} column",
                TRANSACTIONS_COLUMN
            ))
        })?;

        let mut sum = 0.0;
        let mut count = 0usize;
        for (e, t) in effort.iter().zip(transactions) {
            if *t != 0.0 {
                sum += e / t;
                count += 1;
            }
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(sum / count as f64))
    }
}

/// Median of an iterator of values; `None` when empty
fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> HistoricalData {
        HistoricalData::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_mean_unit_cost_simple() {
        let data = load("Effort,Transactions\n100,10\n300,10\n");
        // unit costs 10 and 30
        assert_eq!(data.mean_unit_cost().unwrap(), Some(20.0));
    }

    #[test]
    fn test_zero_transaction_rows_are_excluded_not_zeroed() {
        let with_zero = load("Effort,Transactions\n100,10\n0,0\n");
        let without = load("Effort,Transactions\n100,10\n");
        // adding a zero-transaction row never changes the result
        assert_eq!(
            with_zero.mean_unit_cost().unwrap(),
            without.mean_unit_cost().unwrap()
        );
        assert_eq!(with_zero.mean_unit_cost().unwrap(), Some(10.0));
    }

    #[test]
    fn test_all_zero_transactions_yields_none() {
        let data = load("Effort,Transactions\n100,0\n50,0\n");
        assert_eq!(data.mean_unit_cost().unwrap(), None);
    }

    #[test]
    fn test_missing_effort_column_is_unavailable() {
        let data = load("Cost,Transactions\n100,10\n");
        let err = data.mean_unit_cost().unwrap_err();
        assert_eq!(err.kind(), "historical_data_unavailable");
    }

    #[test]
    fn test_missing_cells_imputed_with_column_median() {
        // Effort column: 10, 20, 30 with one blank; median of {10,20,30} = 20
        let data = load("Effort,Transactions\n10,1\n20,1\n30,1\n,1\n");
        // unit costs 10, 20, 30, 20 -> mean 20
        assert_eq!(data.mean_unit_cost().unwrap(), Some(20.0));
    }

    #[test]
    fn test_unparsable_cells_imputed_like_missing() {
        let data = load("Effort,Transactions\n10,1\nn/a,1\n30,1\n");
        // median of {10, 30} = 20; unit costs 10, 20, 30 -> mean 20
        assert_eq!(data.mean_unit_cost().unwrap(), Some(20.0));
    }

    #[test]
    fn test_len_counts_rows() {
        let data = load("Effort,Transactions\n1,1\n2,2\n3,3\n");
        assert_eq!(data.len(), 3);
        assert!(!data.is_empty());
    }

    #[test]
    fn test_from_path_missing_is_not_found() {
        let err = HistoricalData::from_path(Path::new("/nonexistent/data.csv")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "Effort,Transactions\n100,10\n").unwrap();
        let data = HistoricalData::from_path(&path).unwrap();
        assert_eq!(data.mean_unit_cost().unwrap(), Some(10.0));
    }
}
