use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{round_to, GridState, SimulationStep};

/// Payload of a single-day simulation: summary, ordered steps and the grid
/// state left behind by the last solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySimulation {
    #[serde(default)]
    pub summary: Option<DaySummary>,
    #[serde(default)]
    pub steps: Vec<SimulationStep>,
    #[serde(default)]
    pub grid_state: Option<GridState>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeederStats {
    pub avg_kw: f64,
    pub peak_kw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSummary", into = "RawSummary")]
pub struct DaySummary {
    pub date: String,
    pub status: String,
    pub converged_steps: u32,
    pub total_steps: u32,
    pub min_voltage_pu: Option<f64>,
    pub max_voltage_pu: Option<f64>,
    pub total_violations: Option<u32>,
    pub avg_power_kw: Option<f64>,
    pub peak_power_kw: Option<f64>,
    pub min_power_kw: Option<f64>,
    pub feeders: BTreeMap<String, FeederStats>,
}

impl DaySummary {
    /// Summarizes converged steps only; voltage and power figures stay `None`
    /// when nothing converged.
    pub fn from_steps(date: &str, steps: &[SimulationStep]) -> Self {
        let converged: Vec<&SimulationStep> = steps.iter().filter(|s| s.converged).collect();
        let mut summary = Self {
            date: date.to_string(),
            status: "success".to_string(),
            converged_steps: converged.len() as u32,
            total_steps: steps.len() as u32,
            ..Self::default()
        };
        if converged.is_empty() {
            return summary;
        }

        let powers: Vec<f64> = converged.iter().map(|s| s.total_power_kw).collect();
        summary.min_voltage_pu = fold_min(converged.iter().map(|s| s.min_voltage_pu)).map(|v| round_to(v, 4));
        summary.max_voltage_pu = fold_max(converged.iter().map(|s| s.max_voltage_pu)).map(|v| round_to(v, 4));
        summary.total_violations = Some(converged.iter().map(|s| s.voltage_violations).sum());
        summary.avg_power_kw = mean(&powers).map(|v| round_to(v, 2));
        summary.peak_power_kw = fold_max(powers.iter().copied()).map(|v| round_to(v, 2));
        summary.min_power_kw = fold_min(powers.iter().copied()).map(|v| round_to(v, 2));

        let mut per_feeder: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for step in &converged {
            for (feeder, kw) in &step.feeder_power_kw {
                per_feeder.entry(feeder.as_str()).or_default().push(*kw);
            }
        }
        for (feeder, vals) in per_feeder {
            let (Some(avg), Some(peak)) = (mean(&vals), fold_max(vals.iter().copied())) else {
                continue;
            };
            summary.feeders.insert(
                feeder.to_string(),
                FeederStats {
                    avg_kw: round_to(avg, 2),
                    peak_kw: round_to(peak, 2),
                },
            );
        }
        summary
    }
}

fn mean(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        None
    } else {
        Some(vals.iter().sum::<f64>() / vals.len() as f64)
    }
}

fn fold_min(vals: impl Iterator<Item = f64>) -> Option<f64> {
    vals.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

fn fold_max(vals: impl Iterator<Item = f64>) -> Option<f64> {
    vals.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

// Wire shape: feeder statistics are flattened as avg_power_<F>_kw / peak_power_<F>_kw.
#[derive(Serialize, Deserialize)]
struct RawSummary {
    #[serde(default)]
    date: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    converged_steps: u32,
    #[serde(default)]
    total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_voltage_pu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_voltage_pu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_violations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avg_power_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    peak_power_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_power_kw: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn feeder_stat_key(key: &str) -> Option<(&str, bool)> {
    if let Some(rest) = key.strip_prefix("avg_power_") {
        return rest.strip_suffix("_kw").map(|f| (f, true));
    }
    key.strip_prefix("peak_power_")?
        .strip_suffix("_kw")
        .map(|f| (f, false))
}

impl From<RawSummary> for DaySummary {
    fn from(raw: RawSummary) -> Self {
        let mut feeders: BTreeMap<String, FeederStats> = BTreeMap::new();
        for (key, value) in &raw.extra {
            let (Some((feeder, is_avg)), Some(kw)) = (feeder_stat_key(key), value.as_f64()) else {
                continue;
            };
            if feeder.is_empty() {
                continue;
            }
            let entry = feeders.entry(feeder.to_string()).or_default();
            if is_avg {
                entry.avg_kw = kw;
            } else {
                entry.peak_kw = kw;
            }
        }
        Self {
            date: raw.date,
            status: raw.status,
            converged_steps: raw.converged_steps,
            total_steps: raw.total_steps,
            min_voltage_pu: raw.min_voltage_pu,
            max_voltage_pu: raw.max_voltage_pu,
            total_violations: raw.total_violations,
            avg_power_kw: raw.avg_power_kw,
            peak_power_kw: raw.peak_power_kw,
            min_power_kw: raw.min_power_kw,
            feeders,
        }
    }
}

impl From<DaySummary> for RawSummary {
    fn from(s: DaySummary) -> Self {
        let mut extra = BTreeMap::new();
        for (feeder, stats) in s.feeders {
            extra.insert(format!("avg_power_{feeder}_kw"), stats.avg_kw.into());
            extra.insert(format!("peak_power_{feeder}_kw"), stats.peak_kw.into());
        }
        Self {
            date: s.date,
            status: s.status,
            converged_steps: s.converged_steps,
            total_steps: s.total_steps,
            min_voltage_pu: s.min_voltage_pu,
            max_voltage_pu: s.max_voltage_pu,
            total_violations: s.total_violations,
            avg_power_kw: s.avg_power_kw,
            peak_power_kw: s.peak_power_kw,
            min_power_kw: s.min_power_kw,
            extra,
        }
    }
}
