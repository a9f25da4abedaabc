use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const FEEDER_KEY_PREFIX: &str = "power_";
const FEEDER_KEY_SUFFIX: &str = "_kw";

/// One 15-minute snapshot produced by the simulation service.
///
/// Non-converged steps arrive without their numeric fields; those read as
/// zero. Per-feeder net power travels as flattened `power_<FEEDER>_kw` keys
/// and is gathered into [`SimulationStep::feeder_power_kw`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStep", into = "RawStep")]
pub struct SimulationStep {
    pub step: Option<u32>,
    pub hour: f64,
    pub converged: bool,
    pub total_power_kw: f64,
    pub total_losses_kw: f64,
    pub min_voltage_pu: f64,
    pub max_voltage_pu: f64,
    pub voltage_violations: u32,
    pub total_solar_kw: f64,
    pub total_wind_kw: f64,
    pub total_thermal_kw: f64,
    pub total_generation_kw: f64,
    pub bus_voltages: BTreeMap<String, f64>,
    pub feeder_power_kw: BTreeMap<String, f64>,
}

impl SimulationStep {
    /// `HH:MM` wall-clock label for the step's hour.
    pub fn time_label(&self) -> String {
        let minutes = (self.hour.max(0.0) * 60.0).round() as u32;
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

#[derive(Serialize, Deserialize)]
struct RawStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<u32>,
    #[serde(default)]
    hour: f64,
    #[serde(default)]
    converged: bool,
    #[serde(default)]
    total_power_kw: f64,
    #[serde(default)]
    total_losses_kw: f64,
    #[serde(default)]
    min_voltage_pu: f64,
    #[serde(default)]
    max_voltage_pu: f64,
    #[serde(default)]
    voltage_violations: u32,
    #[serde(default)]
    total_solar_kw: f64,
    #[serde(default)]
    total_wind_kw: f64,
    #[serde(default)]
    total_thermal_kw: f64,
    #[serde(default)]
    total_generation_kw: f64,
    #[serde(default)]
    bus_voltages: BTreeMap<String, f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn feeder_from_key(key: &str) -> Option<&str> {
    let feeder = key
        .strip_prefix(FEEDER_KEY_PREFIX)?
        .strip_suffix(FEEDER_KEY_SUFFIX)?;
    (!feeder.is_empty()).then_some(feeder)
}

impl From<RawStep> for SimulationStep {
    fn from(raw: RawStep) -> Self {
        let feeder_power_kw = raw
            .extra
            .iter()
            .filter_map(|(key, value)| {
                let feeder = feeder_from_key(key)?;
                Some((feeder.to_string(), value.as_f64()?))
            })
            .collect();
        Self {
            step: raw.step,
            hour: raw.hour,
            converged: raw.converged,
            total_power_kw: raw.total_power_kw,
            total_losses_kw: raw.total_losses_kw,
            min_voltage_pu: raw.min_voltage_pu,
            max_voltage_pu: raw.max_voltage_pu,
            voltage_violations: raw.voltage_violations,
            total_solar_kw: raw.total_solar_kw,
            total_wind_kw: raw.total_wind_kw,
            total_thermal_kw: raw.total_thermal_kw,
            total_generation_kw: raw.total_generation_kw,
            bus_voltages: raw.bus_voltages,
            feeder_power_kw,
        }
    }
}

impl From<SimulationStep> for RawStep {
    fn from(step: SimulationStep) -> Self {
        let extra = step
            .feeder_power_kw
            .into_iter()
            .map(|(feeder, kw)| {
                (
                    format!("{FEEDER_KEY_PREFIX}{feeder}{FEEDER_KEY_SUFFIX}"),
                    serde_json::Value::from(kw),
                )
            })
            .collect();
        Self {
            step: step.step,
            hour: step.hour,
            converged: step.converged,
            total_power_kw: step.total_power_kw,
            total_losses_kw: step.total_losses_kw,
            min_voltage_pu: step.min_voltage_pu,
            max_voltage_pu: step.max_voltage_pu,
            voltage_violations: step.voltage_violations,
            total_solar_kw: step.total_solar_kw,
            total_wind_kw: step.total_wind_kw,
            total_thermal_kw: step.total_thermal_kw,
            total_generation_kw: step.total_generation_kw,
            bus_voltages: step.bus_voltages,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathers_flattened_feeder_keys() {
        let raw = r#"{
            "step": 24, "hour": 6.0, "converged": true,
            "total_power_kw": 1520.5, "total_losses_kw": 31.2,
            "power_F06_kw": -42.5, "power_F07_kw": 310,
            "total_solar_kw": 120.0, "total_wind_kw": 0, "total_thermal_kw": 0,
            "total_generation_kw": 120.0,
            "bus_voltages": {"sourcebus": 1.0, "f06_tail": 0.9412},
            "min_voltage_pu": 0.9412, "max_voltage_pu": 1.0, "voltage_violations": 3
        }"#;

        let step: SimulationStep = serde_json::from_str(raw).expect("step decodes");

        assert_eq!(step.step, Some(24));
        assert_eq!(step.feeder_power_kw.get("F06"), Some(&-42.5));
        assert_eq!(step.feeder_power_kw.get("F07"), Some(&310.0));
        assert_eq!(step.feeder_power_kw.len(), 2);
        assert_eq!(step.bus_voltages.get("f06_tail"), Some(&0.9412));
        assert_eq!(step.voltage_violations, 3);
    }

    #[test]
    fn non_converged_step_reads_as_zeroes() {
        let step: SimulationStep =
            serde_json::from_str(r#"{"step": 5, "hour": 1.25, "converged": false}"#)
                .expect("step decodes");

        assert!(!step.converged);
        assert_eq!(step.total_power_kw, 0.0);
        assert!(step.bus_voltages.is_empty());
        assert!(step.feeder_power_kw.is_empty());
    }

    #[test]
    fn serializes_feeders_back_to_flat_keys() {
        let mut step = SimulationStep {
            hour: 0.25,
            converged: true,
            ..SimulationStep::default()
        };
        step.feeder_power_kw.insert("F10".to_string(), 12.5);

        let value = serde_json::to_value(&step).expect("step encodes");

        assert_eq!(value["power_F10_kw"], serde_json::json!(12.5));
        assert!(value.get("feeder_power_kw").is_none());
    }

    #[test]
    fn time_label_formats_quarter_hours() {
        let at = |hour: f64| SimulationStep {
            hour,
            ..SimulationStep::default()
        };
        assert_eq!(at(0.0).time_label(), "00:00");
        assert_eq!(at(6.25).time_label(), "06:15");
        assert_eq!(at(23.75).time_label(), "23:45");
    }

    #[test]
    fn ignores_unrelated_extra_keys() {
        assert_eq!(feeder_from_key("power_F06_kw"), Some("F06"));
        assert_eq!(feeder_from_key("power__kw"), None);
        assert_eq!(feeder_from_key("total_power_kw"), None);
    }
}
