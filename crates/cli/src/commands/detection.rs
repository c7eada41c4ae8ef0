//! Idle detection commands

use anyhow::Result;
use colored::Colorize;
use dashboard_lib::{ResourceRecord, ScoredResource};
use tabled::Tabled;

use crate::client::{ApiClient, IdleResources, LiveIdleReport};
use crate::output::{
    color_confidence, color_status, format_currency, format_metric, print_info, print_rows, OutputFormat,
};

#[derive(Tabled)]
struct IdleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "Memory %")]
    memory: String,
}

impl From<&ResourceRecord> for IdleRow {
    fn from(r: &ResourceRecord) -> Self {
        Self {
            id: r.id.clone(),
            resource_type: r.resource_type.clone(),
            cpu: format_metric(r.metric("cpu_usage")),
            memory: format_metric(r.metric("memory_usage")),
        }
    }
}

#[derive(Tabled)]
struct ScoredRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "Memory %")]
    memory: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

impl From<&ScoredResource> for ScoredRow {
    fn from(s: &ScoredResource) -> Self {
        let status = if s.is_idle { "idle" } else { "running" };
        Self {
            id: s.record.id.clone(),
            status: color_status(status),
            cpu: format_metric(s.record.metric("cpu_usage")),
            memory: format_metric(s.record.metric("memory_usage")),
            score: format!("{:.3}", s.anomaly_score),
            confidence: color_confidence(s.confidence),
        }
    }
}

/// Idle resources among the held-out test batch
pub async fn show_idle(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: IdleResources = client.get("ai/idle-detection").await?;

    let rows: Vec<IdleRow> = result.idle_resources.iter().map(IdleRow::from).collect();
    print_rows(&rows, &result, format)?;

    if matches!(format, OutputFormat::Table) {
        print_info(&format!("{} idle resource(s)", rows.len()));
    }
    Ok(())
}

/// Score a synthetic live batch
pub async fn show_live(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: LiveIdleReport = client.get("ai/idle-detection/live").await?;

    let rows: Vec<ScoredRow> = result.idle_resources.iter().map(ScoredRow::from).collect();
    print_rows(&rows, &result, format)?;

    if matches!(format, OutputFormat::Table) {
        let idle = result.idle_resources.iter().filter(|r| r.is_idle).count();
        println!();
        println!("Analyzed:            {}", result.total_analyzed);
        println!("Idle:                {}", idle);
        println!(
            "{}   {}",
            "Potential Savings:".bold(),
            format_currency(result.potential_savings).green().bold()
        );
    }
    Ok(())
}
