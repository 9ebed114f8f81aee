use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

/// Runs every fleet analysis over one batch of readings and prints the
/// report as JSON.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "fleet-telemetry", version, about)]
pub struct CliArgs {
    /// JSON array of reading records; `-` reads stdin.
    #[arg(value_name = "READINGS")]
    pub readings: PathBuf,

    /// Engine settings file; defaults apply when omitted or missing.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Day to analyse (UTC). Defaults to the day of the newest reading.
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Evaluation time for ongoing periods. Defaults to the current time.
    #[arg(long, value_name = "RFC3339", value_parser = parse_instant)]
    pub now: Option<DateTime<Utc>>,
}

impl CliArgs {
    /// `None` when the batch comes from stdin.
    pub fn readings_path(&self) -> Option<&Path> {
        (self.readings.as_os_str() != "-").then_some(self.readings.as_path())
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}
