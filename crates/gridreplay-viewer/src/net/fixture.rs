use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use gridreplay_core::{DaySimulation, GridState, Topology};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::net::api::SimulationApi;
use crate::playback::dates::format_date;

pub const TOPOLOGY_FILE: &str = "topology.json";
pub const GRID_STATE_FILE: &str = "grid_state.json";

/// Replays recorded service responses from a directory:
/// `topology.json`, one `<YYYY-MM-DD>.json` per day and an optional
/// `grid_state.json`.
#[derive(Debug, Clone)]
pub struct FixtureSimulationApi {
    dir: PathBuf,
}

impl FixtureSimulationApi {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", format_date(date)))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
}

#[async_trait]
impl SimulationApi for FixtureSimulationApi {
    async fn fetch_topology(&self) -> Result<Topology> {
        read_json(&self.dir.join(TOPOLOGY_FILE)).await
    }

    async fn fetch_day_simulation(&self, date: NaiveDate) -> Result<DaySimulation> {
        read_json(&self.day_path(date))
            .await
            .with_context(|| format!("no recorded simulation for {date}"))
    }

    async fn fetch_current_grid_state(&self) -> Result<GridState> {
        read_json(&self.dir.join(GRID_STATE_FILE)).await
    }
}
