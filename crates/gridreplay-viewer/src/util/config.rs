use anyhow::Context;
use directories::ProjectDirs;
use gridreplay_core::{HIGH_VOLTAGE_PU, LOW_VOLTAGE_PU};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::graph::{RadialOptions, Thresholds};
use crate::net::http::DEFAULT_API_BASE_URL;
use crate::playback::store::DEFAULT_SPEED_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub speed_ms: u64,
    pub center_x: f64,
    pub center_y: f64,
    pub ring_spacing: f64,
    pub node_width: f64,
    pub low_voltage_pu: f64,
    pub high_voltage_pu: f64,
    pub refresh_grid_state_on_finish: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        let radial = RadialOptions::default();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            // A simulated day takes the service tens of seconds.
            request_timeout_secs: 300,
            speed_ms: DEFAULT_SPEED_MS,
            center_x: radial.center_x,
            center_y: radial.center_y,
            ring_spacing: radial.ring_spacing,
            node_width: radial.node_width,
            low_voltage_pu: LOW_VOLTAGE_PU,
            high_voltage_pu: HIGH_VOLTAGE_PU,
            refresh_grid_state_on_finish: true,
        }
    }
}

impl ReplayConfig {
    /// Non-positive or non-finite spacings fall back to the defaults.
    pub fn radial_options(&self) -> RadialOptions {
        let defaults = RadialOptions::default();
        RadialOptions {
            center_x: self.center_x,
            center_y: self.center_y,
            ring_spacing: positive_or("ring_spacing", self.ring_spacing, defaults.ring_spacing),
            node_width: positive_or("node_width", self.node_width, defaults.node_width),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            low_pu: self.low_voltage_pu,
            high_pu: self.high_voltage_pu,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn positive_or(field: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!(field, value, default, "layout spacing must be positive, using default");
        default
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "gridreplay")?;
    Some(proj.config_dir().join("viewer.toml"))
}

pub fn load_or_default_from_path(path: &Path) -> ReplayConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return ReplayConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), "ignoring invalid config: {err}");
        ReplayConfig::default()
    })
}

pub fn save_to_path(cfg: &ReplayConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize replay config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write replay config {}", path.display()))?;
    Ok(())
}
