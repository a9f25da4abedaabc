use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::playback::dates::parse_date;
use crate::util::config::ReplayConfig;

/// Replays day-by-day grid simulations over a radially laid out feeder graph.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// First day to replay (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Last day to replay, inclusive; defaults to --start
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Milliseconds between steps
    #[arg(long)]
    pub speed_ms: Option<u64>,

    /// Simulation service base URL
    #[arg(long)]
    pub api: Option<String>,

    /// Replay recorded responses from this directory instead of the service
    #[arg(long, conflicts_with = "api")]
    pub fixtures: Option<PathBuf>,

    /// Config file; defaults to the per-user viewer.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Print the radial layout as JSON and exit
    #[arg(long)]
    pub layout_only: bool,

    /// Do not read playback shortcuts from stdin
    #[arg(long)]
    pub no_stdin: bool,

    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

impl Cli {
    /// CLI flags win over file values.
    pub fn apply_overrides(&self, cfg: &mut ReplayConfig) {
        if let Some(ms) = self.speed_ms.filter(|ms| *ms > 0) {
            cfg.speed_ms = ms;
        }
        if let Some(api) = &self.api {
            cfg.api_base_url = api.clone();
        }
    }

    /// `(start, end)` when a replay was requested.
    pub fn date_span(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end < start => {
                anyhow::bail!("--end {end} is before --start {start}")
            }
            (Some(start), end) => Ok(Some((start, end.unwrap_or(start)))),
            (None, Some(_)) => anyhow::bail!("--end requires --start"),
            (None, None) => Ok(None),
        }
    }
}
