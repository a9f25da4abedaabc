use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use gridreplay_core::{DaySimulation, GridState, Topology};

/// The simulation service as seen by the viewer.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    async fn fetch_topology(&self) -> Result<Topology>;

    /// Full day of 15-minute steps plus the resulting grid state.
    async fn fetch_day_simulation(&self, date: NaiveDate) -> Result<DaySimulation>;

    async fn fetch_current_grid_state(&self) -> Result<GridState>;
}
