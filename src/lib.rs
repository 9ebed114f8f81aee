pub mod alarms;
pub mod analysis;
pub mod buckets;
pub mod cli;
pub mod distance;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod models;
pub mod settings;
pub mod utils;
pub mod working;

use std::io::Read;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};

use alarms::AlarmTracker;
use analysis::{analyze, AnalysisWindow};
use cli::CliArgs;
use models::Reading;
use settings::SettingsStore;

pub use error::{BatchIssues, EngineError};

fn load_readings(args: &CliArgs) -> Result<Vec<Reading>> {
    let raw = match args.readings_path() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read readings from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read readings from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("readings must be a JSON array of reading records")
}

/// Command-line entry: reads a batch, runs every analysis and prints the
/// report as JSON on stdout.
pub fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = CliArgs::parse();

    let settings = match &args.config {
        Some(path) => SettingsStore::new(path.clone())?.snapshot(),
        None => settings::EngineSettings::default(),
    };

    let readings = load_readings(&args)?;
    let now = args.now.unwrap_or_else(Utc::now);
    let target_date = args.date.unwrap_or_else(|| {
        readings
            .iter()
            .filter_map(|r| r.observed_at().ok())
            .max()
            .unwrap_or(now)
            .date_naive()
    });
    info!("analysing {} readings for {target_date}", readings.len());

    let tracker = AlarmTracker::new(settings.thresholds);
    let window = AnalysisWindow::for_day(target_date, now);
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = runtime.block_on(analyze(&readings, &settings, &tracker, window))?;

    for (stage, issues) in &report.issues {
        if !issues.is_clean() {
            warn!(
                "{stage}: {} invalid, {} out of order",
                issues.skipped_invalid, issues.rejected_out_of_order
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
