//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Print rows as a table, or `raw` as JSON
pub fn print_rows<T: Tabled, R: Serialize + ?Sized>(rows: &[T], raw: &R, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()).to_string());
            }
        }
        OutputFormat::Json => print_json(raw)?,
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "ready" | "running" | "healthy" => status.green().to_string(),
        "training" | "degraded" => status.yellow().to_string(),
        "untrained" | "idle" | "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}

pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
