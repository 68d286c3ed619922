//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::planner::{ManifestHasher, Plan, Step, StepKind};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "API Version")]
    api_version: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Change")]
    change: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a migration plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &Plan) -> String {
        if plan.is_empty() {
            return format!("{} No migration steps required.\n", "✓".green());
        }

        let mut output = String::new();
        let hasher = ManifestHasher::new();
        let _ = write!(output, "\nMigration Plan (version {})\n", plan.version);
        let _ = write!(output, "   Fingerprint: {}\n\n", hasher.short_hash(&plan.fingerprint()));

        let rows: Vec<PlanStepRow> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| PlanStepRow {
                index: i + 1,
                step: Self::format_step_kind(step.kind),
                api_version: step.object.api_version.clone(),
                object: Self::truncate(&step.object.to_string(), 48),
                change: Self::describe_change(step),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to edit, {} to delete, {} pause/start\n",
            (plan.count(StepKind::NewManagedResource) + plan.count(StepKind::NewComposition))
                .to_string()
                .green(),
            (plan.count(StepKind::EditComposite)
                + plan.count(StepKind::EditClaim)
                + plan.count(StepKind::EditConfiguration))
            .to_string()
            .yellow(),
            plan.count(StepKind::DeleteManagedResource).to_string().red(),
            (plan.count(StepKind::PauseManagedResource)
                + plan.count(StepKind::PauseComposite)
                + plan.count(StepKind::StartManagedResource)
                + plan.count(StepKind::StartComposite))
            .to_string()
            .dimmed()
        );

        output
    }

    /// Formats validation results.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid\n", "✗".red())
                };
                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a step kind with color.
    fn format_step_kind(kind: StepKind) -> String {
        let label = kind.as_str();
        match kind {
            StepKind::NewManagedResource | StepKind::NewComposition => format!("+{label}").green().to_string(),
            StepKind::EditComposite | StepKind::EditClaim | StepKind::EditConfiguration => {
                format!("~{label}").yellow().to_string()
            }
            StepKind::OrphanManagedResource | StepKind::DeleteManagedResource => {
                format!("-{label}").red().to_string()
            }
            StepKind::PauseManagedResource
            | StepKind::PauseComposite
            | StepKind::StartManagedResource
            | StepKind::StartComposite => label.dimmed().to_string(),
        }
    }

    /// Describes what a step changes.
    fn describe_change(step: &Step) -> String {
        match (&step.patch, &step.version) {
            (_, Some(version)) => format!("manifest ({version})"),
            (Some(patch), None) => Self::truncate(&patch.to_string(), 40),
            (None, None) if step.manifest.is_some() => String::from("manifest"),
            (None, None) => String::from("-"),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.status_line("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.status_line("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.status_line("warning", &"⚠".yellow().to_string(), message)
    }

    fn status_line(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson<'a> {
    version: &'a str,
    fingerprint: String,
    step_count: usize,
    counts: BTreeMap<&'static str, usize>,
    steps: &'a [Step],
}

impl<'a> From<&'a Plan> for PlanJson<'a> {
    fn from(plan: &'a Plan) -> Self {
        Self {
            version: &plan.version,
            fingerprint: plan.fingerprint(),
            step_count: plan.step_count(),
            counts: StepKind::ALL
                .into_iter()
                .map(|kind| (kind.as_str(), plan.count(kind)))
                .filter(|(_, count)| *count > 0)
                .collect(),
            steps: &plan.steps,
        }
    }
}
