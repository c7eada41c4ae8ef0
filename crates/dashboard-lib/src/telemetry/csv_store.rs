//! Telemetry store backed by the cleaned VM telemetry CSV
//!
//! Expects the columns written by the import utility:
//! `vm_id,timestamp,cpu_usage,memory_usage,network_traffic,power_consumption,execution_time,task_type`.
//! Column order does not matter; extra columns are ignored. The file is
//! re-read on every call so the store always reflects what is on disk.

use super::TelemetryStore;
use crate::error::{PipelineError, Result};
use crate::models::ResourceSample;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvTelemetryStore {
    path: PathBuf,
}

impl CsvTelemetryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_samples(path: &Path) -> Result<Vec<ResourceSample>> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| PipelineError::telemetry(format!("{}: {}", path.display(), e)))?;

        let mut samples = Vec::new();
        for (line, row) in reader.deserialize::<ResourceSample>().enumerate() {
            let sample = row.map_err(|e| {
                PipelineError::telemetry(format!("{} row {}: {}", path.display(), line + 1, e))
            })?;
            samples.push(sample);
        }
        Ok(samples)
    }
}

#[async_trait]
impl TelemetryStore for CsvTelemetryStore {
    async fn fetch_all(&self) -> Result<Vec<ResourceSample>> {
        let path = self.path.clone();
        let samples = tokio::task::spawn_blocking(move || Self::read_samples(&path))
            .await
            .map_err(|e| PipelineError::telemetry(format!("reader task failed: {}", e)))??;

        debug!(path = %self.path.display(), rows = samples.len(), "Loaded telemetry CSV");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "vm_id,timestamp,cpu_usage,memory_usage,network_traffic,power_consumption,execution_time,task_type\n";

    fn csv_file(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_cleaned_export() {
        let file = csv_file(
            "c5215826-6237-4a33-9312-72c1df909881,2023-01-25 09:10:54,54.88,78.95,164.78,287.81,7.62,network\n\
             29690bc6-1f34-403b-b509-a1ecb1834fb8,2023-01-26 04:46:34,71.76,29.32,141.41,362.25,76.34,io\n",
        );
        let store = CsvTelemetryStore::new(file.path());
        let samples = store.fetch_all().await.unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].vm_id, "c5215826-6237-4a33-9312-72c1df909881");
        assert_eq!(samples[0].cpu_usage, 54.88);
        assert_eq!(samples[1].execution_time, 76.34);
        assert_eq!(samples[1].task_type, "io");
    }

    #[tokio::test]
    async fn test_missing_file_is_telemetry_error() {
        let store = CsvTelemetryStore::new("/nonexistent/cleaned_vm_data.csv");
        let err = store.fetch_all().await.unwrap_err();
        assert!(matches!(err, PipelineError::Telemetry { .. }));
    }

    #[tokio::test]
    async fn test_malformed_row_reports_line() {
        let file = csv_file("vm-1,2023-01-25 09:10:54,not-a-number,1,1,1,1,io\n");
        let store = CsvTelemetryStore::new(file.path());
        let err = store.fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("row 1"), "{}", err);
    }
}
