//! Optimizer commands

use anyhow::{Context, Result};
use dashboard_lib::{ClusterAssignment, Recommendation, ResourceRecord};
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, Recommendations};
use crate::output::{print_rows, OutputFormat};

#[derive(Tabled)]
struct AssignmentRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Cluster")]
    cluster: usize,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

impl From<&ClusterAssignment> for AssignmentRow {
    fn from(a: &ClusterAssignment) -> Self {
        Self {
            resource: a.resource_id.clone(),
            cluster: a.cluster_id,
            recommendation: a.recommendation.to_string(),
        }
    }
}

/// Read a JSON array of resource records
pub fn read_records(path: &Path) -> Result<Vec<ResourceRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a JSON array of resources", path.display()))
}

/// Count of assignments per recommendation, in mapping order
fn summarize(assignments: &[ClusterAssignment]) -> BTreeMap<usize, (Recommendation, usize)> {
    let mut summary = BTreeMap::new();
    for a in assignments {
        summary
            .entry(a.cluster_id)
            .or_insert((a.recommendation, 0))
            .1 += 1;
    }
    summary
}

/// Recommendations for the test batch, or for the records in `file`
pub async fn optimize(client: &ApiClient, file: Option<&Path>, format: OutputFormat) -> Result<()> {
    let result: Recommendations = match file {
        Some(path) => {
            let records = read_records(path)?;
            client.post("optimizer/batch", &records).await?
        }
        None => client.post("optimizer", &serde_json::json!({})).await?,
    };

    let rows: Vec<AssignmentRow> = result.recommendations.iter().map(AssignmentRow::from).collect();
    print_rows(&rows, &result, format)?;

    if matches!(format, OutputFormat::Table) && !rows.is_empty() {
        println!();
        for (cluster, (recommendation, count)) in summarize(&result.recommendations) {
            println!("cluster {}: {} resource(s) -> {}", cluster, count, recommendation);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "vm-1", "cpu_usage": 4.0}}, {{"id": "vm-2", "uptime": 120.0}}]"#
        )
        .unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metric("cpu_usage"), Some(4.0));
        assert_eq!(records[1].resource_type, "VM");
    }

    #[test]
    fn test_read_records_rejects_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"id": "vm-1"}}"#).unwrap();
        assert!(read_records(file.path()).is_err());
    }

    #[test]
    fn test_summarize_counts_per_cluster() {
        let assignments = vec![
            ClusterAssignment {
                resource_id: "a".into(),
                cluster_id: 2,
                recommendation: Recommendation::ArchiveIdleStorage,
            },
            ClusterAssignment {
                resource_id: "b".into(),
                cluster_id: 0,
                recommendation: Recommendation::DownsizeInstanceType,
            },
            ClusterAssignment {
                resource_id: "c".into(),
                cluster_id: 2,
                recommendation: Recommendation::ArchiveIdleStorage,
            },
        ];
        let summary = summarize(&assignments);
        let keys: Vec<_> = summary.keys().copied().collect();
        assert_eq!(keys, vec![0, 2]);
        assert_eq!(summary[&2], (Recommendation::ArchiveIdleStorage, 2));
    }
}
