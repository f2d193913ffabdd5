use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tally::{AtomicInteger, IncrementStrategy, RaceHarness, RunConfiguration};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Count concurrently with and without atomics and compare the totals", long_about = None)]
struct Cli {
    /// JSON file holding a run configuration; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workers per counter
    #[arg(long)]
    threads: Option<usize>,

    /// Increments per worker
    #[arg(long)]
    loops: Option<usize>,

    /// Spin iterations between the plain counter's read and write
    #[arg(long)]
    window: Option<u32>,

    /// How the atomic workers increment
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Repeat the run and summarize
    #[arg(long, default_value_t = 1)]
    trials: usize,

    /// Seconds to wait for workers before giving up
    #[arg(long, default_value_t = 60)]
    deadline_secs: u64,

    /// Counter width in bits
    #[arg(long, value_enum, default_value_t = Width::Bits32)]
    width: Width,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Native,
    LoadLinked,
}

impl From<Strategy> for IncrementStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Native => Self::Native,
            Strategy::LoadLinked => Self::LoadLinked,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Width {
    #[value(name = "32")]
    Bits32,
    #[value(name = "64")]
    Bits64,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut harness = RaceHarness::new().with_deadline(Duration::from_secs(cli.deadline_secs));

    match cli.width {
        Width::Bits32 => execute::<u32>(&mut harness, &config, cli.trials, cli.json),
        Width::Bits64 => execute::<u64>(&mut harness, &config, cli.trials, cli.json),
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")
}

fn load_config(cli: &Cli) -> Result<RunConfiguration> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => RunConfiguration::default(),
    };

    if let Some(threads) = cli.threads {
        config.thread_count = threads;
    }
    if let Some(loops) = cli.loops {
        config.loop_count = loops;
    }
    if let Some(window) = cli.window {
        config.race_window = window;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy.into();
    }
    Ok(config)
}

fn execute<T>(
    harness: &mut RaceHarness,
    config: &RunConfiguration,
    trials: usize,
    json: bool,
) -> Result<()>
where
    T: AtomicInteger + Serialize,
{
    if trials > 1 {
        let summary = harness
            .run_trials::<T>(config, trials)
            .context("Harness run failed")?;
        anyhow::ensure!(
            summary.atomic_mismatches == 0,
            "atomic counter lost updates in {} of {} trials",
            summary.atomic_mismatches,
            summary.trials
        );
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{summary}");
        }
    } else {
        let report = harness.run::<T>(config).context("Harness run failed")?;
        anyhow::ensure!(
            report.atomic_observed == report.expected,
            "atomic counter lost updates"
        );
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{report}");
        }
    }
    Ok(())
}
