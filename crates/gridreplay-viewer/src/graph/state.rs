use gridreplay_core::Topology;
use std::collections::BTreeMap;

use crate::graph::layout::{layout_tree, RadialOptions, RadialTree};
use crate::graph::view::{build_view, GraphView, Thresholds};
use crate::playback::LiveMetrics;

/// Topology, its radial placement and the latest colored view.
pub struct GraphState {
    pub topology: Topology,
    pub tree: RadialTree,
    pub view: GraphView,
    pub opts: RadialOptions,
    pub thresholds: Thresholds,
    pub layout_runs: usize,
}

impl GraphState {
    pub fn new(opts: RadialOptions, thresholds: Thresholds) -> Self {
        Self {
            topology: Topology::default(),
            tree: RadialTree::default(),
            view: GraphView::default(),
            opts,
            thresholds,
            layout_runs: 0,
        }
    }

    /// Re-runs the layout only when the topology actually changed. Returns
    /// whether it did.
    pub fn load_topology(&mut self, topology: Topology, live: Option<&LiveMetrics>) -> bool {
        let changed = topology != self.topology || self.layout_runs == 0;
        if changed {
            if topology.is_empty() {
                tracing::warn!("topology has no buses");
            }
            let dangling = topology.dangling_edges().count();
            if dangling > 0 {
                tracing::warn!(dangling, "topology has edges to unknown buses");
            }
            self.tree = layout_tree(&topology, &self.opts);
            self.topology = topology;
            self.layout_runs += 1;
            tracing::info!(
                nodes = self.topology.nodes.len(),
                edges = self.topology.edges.len(),
                disconnected = self.tree.disconnected.len(),
                radius = self.tree.field_radius(&self.opts),
                root = ?self.tree.root.as_ref().map(|r| r.0.as_str()),
                "topology laid out"
            );
        }
        self.rebuild(live);
        if changed {
            tracing::debug!(categories = ?self.category_tally(), "bus categories");
        }
        changed
    }

    pub fn apply_live(&mut self, live: Option<&LiveMetrics>) {
        self.rebuild(live);
    }

    fn category_tally(&self) -> BTreeMap<&'static str, usize> {
        let mut tally = BTreeMap::new();
        for node in &self.view.nodes {
            *tally.entry(node.category.as_str()).or_insert(0) += 1;
        }
        tally
    }

    fn rebuild(&mut self, live: Option<&LiveMetrics>) {
        self.view = build_view(&self.topology, live, &self.tree.positions, &self.thresholds);
    }
}

impl Default for GraphState {
    fn default() -> Self {
        Self::new(RadialOptions::default(), Thresholds::default())
    }
}
