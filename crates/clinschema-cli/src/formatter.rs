//! Output formatters for provisioning runs.

use clap::ValueEnum;
use clinschema_core::{ApplyResult, ProvisioningRun, RunReport};
use comfy_table::{Cell, Table};

/// Output format for run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format per-object apply results.
    fn format_results(&self, results: &[ApplyResult]) -> String;

    /// Format the PASS/FAIL report.
    fn format_report(&self, report: &RunReport) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;

    /// Format a whole run.
    fn format_run(&self, run: &ProvisioningRun) -> String {
        format!(
            "{}\n\n{}",
            self.format_results(&run.results),
            self.format_report(&run.report)
        )
    }
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_results(&self, results: &[ApplyResult]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Object", "Status", "Error"]);

        for result in results {
            table.add_row(vec![
                Cell::new(&result.object),
                Cell::new(result.status()),
                Cell::new(result.error().map(|e| e.to_string()).unwrap_or_default()),
            ]);
        }

        format!("{}\n{} object(s)", table, results.len())
    }

    fn format_report(&self, report: &RunReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Check", "Status", "Detail"]);

        for (name, entry) in &report.results {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(entry.status),
                Cell::new(&entry.detail),
            ]);
        }

        format!(
            "{}\n{}: {} ({}/{} passed, {})",
            table,
            report.summary.status,
            report.summary.message,
            report.run.passed,
            report.run.total,
            report.run.success_rate
        )
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_results(&self, results: &[ApplyResult]) -> String {
        serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_report(&self, report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({
            "error": error
        })
        .to_string()
    }

    fn format_run(&self, run: &ProvisioningRun) -> String {
        serde_json::to_string_pretty(&serde_json::json!({
            "results": run.results,
            "report": run.report,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }
}
