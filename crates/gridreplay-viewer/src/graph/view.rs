use gridreplay_core::{
    EdgeId, EdgeKind, NodeId, Topology, TopologyEdge, VoltageBand, HIGH_VOLTAGE_PU,
    LOW_VOLTAGE_PU,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::model::Point;
use crate::playback::LiveMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Substation,
    Solar,
    Wind,
    Thermal,
    Hospital,
    Factory,
    School,
    Commercial,
    Residential,
    Transformer,
    Bus,
}

impl NodeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Substation => "substation",
            Self::Solar => "solar",
            Self::Wind => "wind",
            Self::Thermal => "thermal",
            Self::Hospital => "hospital",
            Self::Factory => "factory",
            Self::School => "school",
            Self::Commercial => "commercial",
            Self::Residential => "residential",
            Self::Transformer => "transformer",
            Self::Bus => "bus",
        }
    }
}

// Evaluated top to bottom; first match wins.
const CATEGORY_RULES: &[(&[&str], NodeCategory)] = &[
    (&["solar", "pv"], NodeCategory::Solar),
    (&["wind"], NodeCategory::Wind),
    (&["hospital"], NodeCategory::Hospital),
    (&["factory", "industr"], NodeCategory::Factory),
    (&["school", "university"], NodeCategory::School),
    (&["commercial", "mall", "office"], NodeCategory::Commercial),
    (&["residential", "house", "home"], NodeCategory::Residential),
    (&["thermal", "diesel", "gen"], NodeCategory::Thermal),
    (&["source", "substation", "grid"], NodeCategory::Substation),
];

pub fn categorize(label: &str) -> NodeCategory {
    let label = label.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(NodeCategory::Bus)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low_pu: f64,
    pub high_pu: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_pu: LOW_VOLTAGE_PU,
            high_pu: HIGH_VOLTAGE_PU,
        }
    }
}

pub fn band_color(band: Option<VoltageBand>) -> &'static str {
    match band {
        Some(VoltageBand::Low) => "#3b82f6",
        Some(VoltageBand::Normal) => "#22c55e",
        Some(VoltageBand::High) => "#ef4444",
        None => "#9ca3af",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: NodeId,
    pub label: String,
    pub category: NodeCategory,
    pub voltage_pu: Option<f64>,
    pub band: Option<VoltageBand>,
    pub color: &'static str,
    pub position: Point,
    pub synthetic: bool,
}

/// `from` → `to` is the drawn arrow direction, already flipped for
/// reverse flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub feeder: Option<String>,
    pub reverse_flow: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewCounts {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub unknown: usize,
    pub reverse_flow: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    #[cfg(test)]
    pub fn node(&self, id: &NodeId) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn counts(&self) -> ViewCounts {
        let mut counts = ViewCounts::default();
        for node in self.nodes.iter().filter(|n| !n.synthetic) {
            match node.band {
                Some(VoltageBand::Low) => counts.low += 1,
                Some(VoltageBand::Normal) => counts.normal += 1,
                Some(VoltageBand::High) => counts.high += 1,
                None => counts.unknown += 1,
            }
        }
        counts.reverse_flow = self.edges.iter().filter(|e| e.reverse_flow).count();
        counts
    }
}

fn bus_voltage(bus_voltages: &BTreeMap<String, f64>, id: &NodeId) -> Option<f64> {
    bus_voltages
        .get(&id.0)
        .or_else(|| bus_voltages.get(&id.0.to_lowercase()))
        .copied()
}

/// Feeder whose id equals one of the edge label's (or id's) tokens, e.g.
/// `Line.F06_Sec2` belongs to `F06`.
pub fn feeder_for_edge<'a>(
    edge: &TopologyEdge,
    feeders: &'a BTreeMap<String, f64>,
) -> Option<&'a str> {
    let tokens: Vec<&str> = edge
        .label
        .split(|c: char| !c.is_ascii_alphanumeric())
        .chain(edge.id.0.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();
    feeders
        .keys()
        .find(|feeder| tokens.iter().any(|t| t.eq_ignore_ascii_case(feeder)))
        .map(String::as_str)
}

pub fn build_view(
    topology: &Topology,
    live: Option<&LiveMetrics>,
    positions: &HashMap<NodeId, Point>,
    thresholds: &Thresholds,
) -> GraphView {
    let empty = BTreeMap::new();
    let bus_voltages = live.map(|l| &l.bus_voltages).unwrap_or(&empty);
    let feeder_power = live.map(|l| &l.feeder_power_kw).unwrap_or(&empty);
    let mut view = GraphView::default();
    let mut seen: HashSet<&NodeId> = HashSet::with_capacity(topology.nodes.len());

    for node in &topology.nodes {
        if !seen.insert(&node.id) {
            continue;
        }
        let voltage_pu = bus_voltage(bus_voltages, &node.id);
        let band = voltage_pu
            .map(|pu| VoltageBand::classify_with(pu, thresholds.low_pu, thresholds.high_pu));
        view.nodes.push(ViewNode {
            id: node.id.clone(),
            label: node.display_label().to_string(),
            category: categorize(node.display_label()),
            voltage_pu,
            band,
            color: band_color(band),
            position: positions.get(&node.id).copied().unwrap_or_default(),
            synthetic: false,
        });
    }

    for edge in &topology.edges {
        let (Some(src), Some(dst)) = (positions.get(&edge.source), positions.get(&edge.target))
        else {
            continue;
        };
        match edge.kind {
            EdgeKind::Line => {
                let feeder = feeder_for_edge(edge, feeder_power);
                let reverse_flow = feeder
                    .and_then(|f| feeder_power.get(f))
                    .is_some_and(|kw| *kw < 0.0);
                let (from, to) = if reverse_flow {
                    (edge.target.clone(), edge.source.clone())
                } else {
                    (edge.source.clone(), edge.target.clone())
                };
                view.edges.push(ViewEdge {
                    id: edge.id.clone(),
                    from,
                    to,
                    kind: EdgeKind::Line,
                    feeder: feeder.map(str::to_string),
                    reverse_flow,
                });
            }
            EdgeKind::Transformer => {
                let mid = NodeId(format!("{}#xfmr", edge.id.0));
                let label = if edge.label.is_empty() {
                    edge.id.0.clone()
                } else {
                    edge.label.clone()
                };
                view.nodes.push(ViewNode {
                    id: mid.clone(),
                    label,
                    category: NodeCategory::Transformer,
                    voltage_pu: None,
                    band: None,
                    color: band_color(None),
                    position: Point::midpoint(*src, *dst),
                    synthetic: true,
                });
                for (suffix, from, to) in [
                    ("hv", edge.source.clone(), mid.clone()),
                    ("lv", mid.clone(), edge.target.clone()),
                ] {
                    view.edges.push(ViewEdge {
                        id: EdgeId(format!("{}#{suffix}", edge.id.0)),
                        from,
                        to,
                        kind: EdgeKind::Transformer,
                        feeder: None,
                        reverse_flow: false,
                    });
                }
            }
        }
    }
    view
}
