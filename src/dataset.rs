//! Reference dataset of previously clustered rows, loaded with Polars

use crate::error::{PredictError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Read-only table whose rows carry a cluster id
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    path: PathBuf,
    /// All columns cast to Float64 at load time
    frame: DataFrame,
    cluster_column: String,
}

/// Rows of the reference dataset belonging to one cluster
#[derive(Debug, Clone)]
pub struct ClusterSubset {
    pub cluster: i64,
    pub rows: usize,
    /// Non-cluster columns in file order with their non-null values
    pub columns: Vec<(String, Vec<f64>)>,
}

impl ReferenceDataset {
    /// Load a CSV file with a header row; every column must be numeric
    pub fn load<P: AsRef<Path>>(path: P, cluster_column: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fail = |reason: String| PredictError::DatasetLoad {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|e| fail(e.to_string()))?;
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            // Infer from every row so a late fractional value still parses
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| fail(e.to_string()))?;

        let dataset = Self::from_frame(path.clone(), frame, cluster_column).map_err(fail)?;

        info!(
            path = %dataset.path.display(),
            rows = dataset.row_count(),
            columns = dataset.frame.width(),
            cluster_column = %dataset.cluster_column,
            "Reference dataset loaded"
        );

        Ok(dataset)
    }

    fn from_frame(
        path: PathBuf,
        frame: DataFrame,
        cluster_column: &str,
    ) -> std::result::Result<Self, String> {
        if frame.column(cluster_column).is_err() {
            return Err(format!("cluster column '{}' not found", cluster_column));
        }

        let mut columns = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            let name = column.name().to_string();
            let numeric = column
                .strict_cast(&DataType::Float64)
                .map_err(|e| format!("column '{}' is not numeric: {}", name, e))?;
            columns.push(numeric);
        }
        let frame = DataFrame::new(columns).map_err(|e| e.to_string())?;

        Ok(Self {
            path,
            frame,
            cluster_column: cluster_column.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn cluster_column(&self) -> &str {
        &self.cluster_column
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Rows whose cluster column equals `cluster`, and only those
    pub fn cluster_subset(&self, cluster: i64) -> Result<ClusterSubset> {
        self.filter_cluster(cluster).map_err(|e| PredictError::DatasetLoad {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn filter_cluster(&self, cluster: i64) -> PolarsResult<ClusterSubset> {
        let ids = self.frame.column(&self.cluster_column)?.f64()?;
        let mask = ids.equal(cluster as f64);
        let subset = self.frame.filter(&mask)?;

        let mut columns = Vec::with_capacity(subset.width().saturating_sub(1));
        for column in subset.get_columns() {
            let name = column.name().to_string();
            if name == self.cluster_column {
                continue;
            }
            let values: Vec<f64> = column.f64()?.into_iter().flatten().collect();
            columns.push((name, values));
        }

        Ok(ClusterSubset {
            cluster,
            rows: subset.height(),
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "BALANCE,PURCHASES,TENURE,Cluster").unwrap();
        writeln!(file, "40.9,95.4,12,0").unwrap();
        writeln!(file, "3202.4,0.0,12,1").unwrap();
        writeln!(file, "2495.1,773.1,12,1").unwrap();
        writeln!(file, "1666.6,1499.0,6,2").unwrap();
        writeln!(file, "817.7,16.0,12,1").unwrap();
        file
    }

    #[test]
    fn test_load_dataset() {
        let file = create_test_csv();
        let dataset = ReferenceDataset::load(file.path(), "Cluster").unwrap();
        assert_eq!(dataset.row_count(), 5);
        assert_eq!(
            dataset.column_names(),
            vec!["BALANCE", "PURCHASES", "TENURE", "Cluster"]
        );
        assert_eq!(dataset.cluster_column(), "Cluster");
    }

    #[test]
    fn test_cluster_subset_is_exact() {
        let file = create_test_csv();
        let dataset = ReferenceDataset::load(file.path(), "Cluster").unwrap();

        let subset = dataset.cluster_subset(1).unwrap();
        assert_eq!(subset.rows, 3);
        assert_eq!(subset.columns.len(), 3);
        assert_eq!(subset.columns[0].0, "BALANCE");
        assert_eq!(subset.columns[0].1, vec![3202.4, 2495.1, 817.7]);
        assert!(subset.columns.iter().all(|(name, _)| name != "Cluster"));

        let subset = dataset.cluster_subset(2).unwrap();
        assert_eq!(subset.rows, 1);
        assert_eq!(subset.columns[2].1, vec![6.0]);
    }

    #[test]
    fn test_unknown_cluster_is_empty() {
        let file = create_test_csv();
        let dataset = ReferenceDataset::load(file.path(), "Cluster").unwrap();
        let subset = dataset.cluster_subset(7).unwrap();
        assert_eq!(subset.rows, 0);
        assert!(subset.columns.iter().all(|(_, values)| values.is_empty()));
    }

    #[test]
    fn test_missing_cluster_column() {
        let file = create_test_csv();
        let err = ReferenceDataset::load(file.path(), "Segment").unwrap_err();
        assert_eq!(err.kind(), "dataset_load");
        assert!(err.to_string().contains("Segment"));
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CUST_ID,BALANCE,Cluster").unwrap();
        writeln!(file, "C10001,40.9,0").unwrap();
        assert!(ReferenceDataset::load(file.path(), "Cluster").is_err());
    }

    #[test]
    fn test_late_fractional_value_is_read() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "BALANCE,Cluster").unwrap();
        for _ in 0..1200 {
            writeln!(file, "100,0").unwrap();
        }
        writeln!(file, "95.4,0").unwrap();

        let dataset = ReferenceDataset::load(file.path(), "Cluster").unwrap();
        assert_eq!(dataset.row_count(), 1201);

        let subset = dataset.cluster_subset(0).unwrap();
        assert_eq!(subset.rows, 1201);
        assert_eq!(subset.columns[0].1.last(), Some(&95.4));
    }

    #[test]
    fn test_missing_file() {
        assert!(ReferenceDataset::load("/nonexistent/Clustered_Customer_Data.csv", "Cluster").is_err());
    }
}
