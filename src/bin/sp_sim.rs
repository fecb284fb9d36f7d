//! Stability Pool simulator
//!
//! Replays scenario files against a pool and inspects persisted state.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use stability_pool::cli::{replay_progress, run_with_progress, OutputFormat, OutputFormatter, Scenario, Simulation};
use stability_pool::core::config::PoolConfig;
use stability_pool::storage::{FileStore, PoolStateStore};

/// Stability Pool simulator - replay liquidations against a product-sum pool
#[derive(Parser)]
#[command(name = "sp-sim")]
#[command(version = stability_pool::VERSION)]
#[command(about = "Replay scenarios against a Stability Pool", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Pool configuration file (JSON)
    #[arg(short, long, env = "SP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding persisted state (overrides the configuration)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Output format: text, json, json-pretty
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Run {
        /// Scenario file (JSON)
        scenario: PathBuf,

        /// Continue from and save into the data directory
        #[arg(short, long)]
        persist: bool,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Show the persisted pool
    Show,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_command(&cli) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let output = OutputFormatter::new(cli.format);

    match &cli.command {
        Commands::Run {
            scenario,
            persist,
            quiet,
        } => cmd_run(&config, &output, scenario, *persist, *quiet),
        Commands::Show => cmd_show(&config, &output),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_run(
    config: &PoolConfig,
    output: &OutputFormatter,
    path: &PathBuf,
    persist: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;

    let store = if persist {
        Some(PoolStateStore::new(FileStore::new(&config.data_dir)?))
    } else {
        None
    };
    let mut sim = match &store {
        Some(store) => match Simulation::load(store)? {
            Some(sim) => sim,
            None => Simulation::new(config)?,
        },
        None => Simulation::new(config)?,
    };

    let progress = if quiet || output.format() != OutputFormat::Text {
        None
    } else {
        Some(replay_progress(scenario.steps.len() as u64))
    };
    let reports = run_with_progress(&mut sim, &scenario, progress.as_ref())?;

    for report in &reports {
        output.step(report);
    }
    output.summary(&sim.summary()?, &reports);

    if let Some(store) = &store {
        sim.save(store)?;
        if output.format() == OutputFormat::Text {
            output.success(&format!("State saved to {}", config.data_dir.display()));
        }
    }
    Ok(())
}

fn cmd_show(config: &PoolConfig, output: &OutputFormatter) -> anyhow::Result<()> {
    let store = PoolStateStore::new(FileStore::new(&config.data_dir)?);
    let sim = Simulation::load(&store)?.ok_or_else(|| {
        anyhow::anyhow!("No pool state found in {}", config.data_dir.display())
    })?;
    output.summary(&sim.summary()?, &[]);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(cli: &Cli) -> anyhow::Result<PoolConfig> {
    let config = match &cli.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    let mut config = config.with_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}
