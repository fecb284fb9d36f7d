//! Stability Pool simulator support.
//!
//! Scenario parsing and replay, and output formatting for `sp-sim`.

pub mod output;
pub mod scenario;

pub use output::*;
pub use scenario::*;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;

/// Progress bar for a replay of `len` steps
pub fn replay_progress(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Replay `scenario`, advancing `progress` after every step
pub fn run_with_progress(
    sim: &mut Simulation,
    scenario: &Scenario,
    progress: Option<&ProgressBar>,
) -> Result<Vec<StepReport>> {
    let reports = sim.run(scenario, |report| {
        if let Some(bar) = progress {
            bar.set_message(report.op.clone());
            bar.inc(1);
        }
    });
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    reports
}
