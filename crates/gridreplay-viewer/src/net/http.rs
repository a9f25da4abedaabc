use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use gridreplay_core::{DaySimulation, GridState, Topology};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::net::api::SimulationApi;
use crate::playback::dates::format_date;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";

/// Blocking `ureq` client; each request runs on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpSimulationApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSimulationApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(path);
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            tracing::debug!(%url, "GET");
            read_json(&url, agent.get(&url).call())
        })
        .await
        .context("http worker panicked")?
    }

    async fn post<T>(&self, path: &str, body: Value) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(path);
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            tracing::debug!(%url, %body, "POST");
            read_json(&url, agent.post(&url).send_json(body))
        })
        .await
        .context("http worker panicked")?
    }
}

fn read_json<T: DeserializeOwned>(
    url: &str,
    result: std::result::Result<ureq::Response, ureq::Error>,
) -> Result<T> {
    match result {
        Ok(response) => response
            .into_json::<T>()
            .with_context(|| format!("decoding response from {url}")),
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            bail!("{url} returned HTTP {code}: {}", error_detail(&body))
        }
        Err(err) => Err(err).with_context(|| format!("requesting {url}")),
    }
}

/// The service reports failures as `{"detail": ...}`; anything else is
/// passed through as text.
pub fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());
    match detail {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl SimulationApi for HttpSimulationApi {
    async fn fetch_topology(&self) -> Result<Topology> {
        self.get("grid/topology").await
    }

    async fn fetch_day_simulation(&self, date: NaiveDate) -> Result<DaySimulation> {
        let body = serde_json::json!({ "date": format_date(date) });
        self.post("pipeline/simulate-day", body)
            .await
            .with_context(|| format!("simulating {date}"))
    }

    async fn fetch_current_grid_state(&self) -> Result<GridState> {
        self.get("grid/current-state").await
    }
}
