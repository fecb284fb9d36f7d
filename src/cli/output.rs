//! CLI output formatting.
//!
//! Handles text and JSON rendering of simulator results.

use console::{style, Term};
use serde::Serialize;

use crate::cli::scenario::{SimulationSummary, StepReport};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON, one document per line
    Json,
    /// Indented JSON
    JsonPretty,
}

impl OutputFormat {
    fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonPretty)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for the simulator
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    format: OutputFormat,
    term: Term,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

impl OutputFormatter {
    /// Create new formatter writing to stdout
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            term: Term::stdout(),
        }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.format.is_json() {
            self.print_json(&serde_json::json!({ "status": "success", "message": message }));
        } else {
            self.line(&format!("{} {}", style("✓").green(), message));
        }
    }

    /// Print a step outcome (text mode only; JSON output carries the full report)
    pub fn step(&self, report: &StepReport) {
        if self.format.is_json() {
            return;
        }
        let index = style(format!("#{:<3}", report.index)).dim();
        let op = style(format!("{:<13}", report.op)).cyan();
        match &report.error {
            None => self.line(&format!("{} {} {}", index, op, report.detail)),
            Some(err) => {
                let code = report.code.map(|c| format!("[E{}] ", c)).unwrap_or_default();
                self.line(&format!("{} {} {}{}", index, op, style(code).red().bold(), style(err).red()))
            }
        }
    }

    /// Print the pool summary
    pub fn summary(&self, summary: &SimulationSummary, steps: &[StepReport]) {
        if self.format.is_json() {
            self.print_json(&serde_json::json!({ "steps": steps, "pool": summary }));
            return;
        }

        let stats = &summary.statistics;
        self.line(&format!("\n{}", style("Stability Pool").bold().underlined()));
        self.line(&format!("  Total deposits: {}", style(stats.total_deposits).green()));
        self.line(&format!("  Depositors:     {}", stats.depositor_count));
        self.line(&format!(
            "  P:              {} (epoch {}, scale {})",
            style(stats.p.raw()).yellow(),
            stats.epoch,
            stats.scale
        ));
        self.line(&format!(
            "  Offsets:        {} absorbing {}",
            stats.totals.liquidations_absorbed, stats.totals.debt_absorbed
        ));
        for (collateral, amount) in &stats.totals.collateral_absorbed {
            self.line(&format!("    {:<12}  {}", collateral, amount));
        }
        if !stats.totals.emissions_discarded.is_zero() {
            self.line(&format!(
                "  Discarded:      {}",
                style(stats.totals.emissions_discarded).red()
            ));
        }
        self.line(&format!("  State hash:     {}", style(&summary.state_hash).dim()));

        if summary.depositors.is_empty() {
            return;
        }
        self.line(&format!("\n{}", style("Depositors").bold().underlined()));
        for view in &summary.depositors {
            self.line(&format!(
                "  {:<12} deposit {}  reward {} (paid {})",
                style(&view.label).bold(),
                style(view.deposit).green(),
                view.reward,
                view.rewards_paid
            ));
            for (collateral, gain) in view.gains.iter().filter(|(_, g)| !g.is_zero()) {
                self.line(&format!("  {:<12}   {} {}", "", gain, collateral));
            }
        }

        let rejected = steps.iter().filter(|s| !s.is_ok()).count();
        if rejected > 0 {
            self.line(&format!("\n{} {} step(s) rejected", style("!").yellow(), rejected));
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn print_json<T: Serialize>(&self, data: &T) {
        let output = if matches!(self.format, OutputFormat::JsonPretty) {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        if let Ok(json) = output {
            self.line(&json);
        }
    }
}
