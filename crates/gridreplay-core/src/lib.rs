use serde::{Deserialize, Serialize};

mod day;
mod grid;
mod step;
mod topology;

pub use day::{DaySimulation, DaySummary, FeederStats};
pub use grid::{
    BusState, GeneratorState, GridState, GridSummary, LineState, LoadState, TransformerState,
    Violations,
};
pub use step::SimulationStep;
pub use topology::{EdgeKind, Topology, TopologyEdge, TopologyNode};

/// One simulated day at 15-minute resolution.
pub const STEPS_PER_DAY: usize = 96;

pub const LOW_VOLTAGE_PU: f64 = 0.95;
pub const HIGH_VOLTAGE_PU: f64 = 1.05;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageBand {
    Low,
    Normal,
    High,
}

impl VoltageBand {
    pub fn classify_with(pu: f64, low: f64, high: f64) -> Self {
        if pu < low {
            Self::Low
        } else if pu > high {
            Self::High
        } else {
            Self::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
