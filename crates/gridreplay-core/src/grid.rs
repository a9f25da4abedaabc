use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSummary {
    pub total_power_kw: f64,
    pub total_power_kvar: f64,
    pub total_losses_kw: f64,
    pub total_generation_kw: f64,
    pub total_solar_kw: f64,
    pub total_load_kw: f64,
    pub num_voltage_violations: u32,
    pub num_overloaded_elements: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusState {
    pub name: String,
    pub base_kv: f64,
    pub voltage_pu: Vec<f64>,
    pub voltage_angle: Vec<f64>,
}

impl BusState {
    /// Mean per-unit magnitude over the bus phases, ignoring readings outside
    /// the plausible 0.1..2.0 pu window.
    pub fn mean_voltage_pu(&self) -> Option<f64> {
        let valid: Vec<f64> = self
            .voltage_pu
            .iter()
            .copied()
            .filter(|v| *v > 0.1 && *v < 2.0)
            .collect();
        if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum::<f64>() / valid.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineState {
    pub name: String,
    pub bus1: String,
    pub bus2: String,
    pub power_kw: f64,
    pub current_amps: Vec<f64>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerState {
    pub name: String,
    pub kva: f64,
    pub loading_percent: f64,
    pub power_kw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadState {
    pub name: String,
    pub bus: String,
    pub kw: f64,
    pub kvar: f64,
    pub voltage_pu: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorState {
    pub name: String,
    pub bus: String,
    pub kw: f64,
    pub kvar: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Violations {
    pub voltage: Vec<String>,
    pub overloads: Vec<String>,
}

/// Full element snapshot as returned by the grid-state endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridState {
    pub timestamp: f64,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_time: Option<String>,
    pub summary: GridSummary,
    pub buses: BTreeMap<String, BusState>,
    pub lines: BTreeMap<String, LineState>,
    pub transformers: BTreeMap<String, TransformerState>,
    pub loads: BTreeMap<String, LoadState>,
    pub generators: BTreeMap<String, GeneratorState>,
    pub violations: Violations,
}

impl GridState {
    pub fn bus_voltage_pu(&self, bus: &str) -> Option<f64> {
        self.buses.get(bus)?.mean_voltage_pu()
    }

    pub fn disabled_lines(&self) -> impl Iterator<Item = &LineState> {
        self.lines.values().filter(|l| !l.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_partial_grid_state() {
        let raw = r#"{
            "timestamp": 24.0, "converged": true, "simulation_time": "24:00",
            "summary": {"total_power_kw": 812.0, "num_voltage_violations": 2},
            "buses": {"b1": {"name": "b1", "base_kv": 11.0, "voltage_pu": [0.99, 1.01, 5.0], "voltage_angle": [0, -120, 120]}},
            "lines": {"l1": {"name": "l1", "bus1": "b1", "bus2": "b2", "power_kw": 10.0, "current_amps": [1.0], "enabled": false}}
        }"#;

        let state: GridState = serde_json::from_str(raw).expect("grid state decodes");

        assert_eq!(state.summary.num_voltage_violations, 2);
        let b1 = state.bus_voltage_pu("b1").expect("b1 has valid phases");
        assert!((b1 - 1.0).abs() < 1e-9);
        assert_eq!(state.bus_voltage_pu("missing"), None);
        assert_eq!(state.disabled_lines().count(), 1);
        assert!(state.generators.is_empty());
    }
}
