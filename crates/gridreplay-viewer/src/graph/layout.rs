use gridreplay_core::{NodeId, Topology};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::TAU;

use crate::graph::model::{Adjacency, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialOptions {
    pub center_x: f64,
    pub center_y: f64,
    pub ring_spacing: f64,
    /// Horizontal spacing of the fallback row for unreachable nodes.
    pub node_width: f64,
}

impl Default for RadialOptions {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            ring_spacing: 120.0,
            node_width: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreePlacement {
    pub depth: usize,
    pub parent: Option<NodeId>,
    pub weight: usize,
    pub sector_start: f64,
    pub sector_span: f64,
    pub angle: f64,
}

/// Spanning tree rooted at the highest-voltage bus plus the resulting
/// positions for every node, tree member or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialTree {
    pub root: Option<NodeId>,
    pub placements: HashMap<NodeId, TreePlacement>,
    pub disconnected: Vec<NodeId>,
    pub max_depth: usize,
    pub positions: HashMap<NodeId, Point>,
}

impl RadialTree {
    /// Radius of the outermost ring actually used by tree members.
    pub fn field_radius(&self, opts: &RadialOptions) -> f64 {
        self.max_depth as f64 * opts.ring_spacing
    }
}

/// Position of every unique node id in `topology`.
pub fn layout(topology: &Topology, opts: &RadialOptions) -> HashMap<NodeId, Point> {
    layout_tree(topology, opts).positions
}

pub fn layout_tree(topology: &Topology, opts: &RadialOptions) -> RadialTree {
    let adj = Adjacency::from_topology(topology);
    let Some(root) = adj.pick_root() else {
        return RadialTree::default();
    };
    let n = adj.len();

    // BFS spanning tree; children keep discovery order.
    let mut depth: Vec<Option<usize>> = vec![None; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order: Vec<usize> = Vec::with_capacity(n);
    let mut q: VecDeque<usize> = VecDeque::new();
    depth[root] = Some(0);
    q.push_back(root);
    while let Some(cur) = q.pop_front() {
        order.push(cur);
        let d = depth[cur].unwrap_or(0);
        for &nb in adj.neighbors(cur) {
            if depth[nb].is_none() {
                depth[nb] = Some(d + 1);
                parent[nb] = Some(cur);
                children[cur].push(nb);
                q.push_back(nb);
            }
        }
    }

    // Reverse BFS order visits every child before its parent.
    let mut weight = vec![1usize; n];
    for &i in order.iter().rev() {
        if let Some(p) = parent[i] {
            weight[p] += weight[i];
        }
    }

    let mut sector_start = vec![0.0f64; n];
    let mut sector_span = vec![0.0f64; n];
    let mut angle = vec![0.0f64; n];
    sector_span[root] = TAU;
    for &i in &order {
        let total: usize = children[i].iter().map(|&c| weight[c]).sum();
        if total == 0 {
            continue;
        }
        let mut cursor = sector_start[i];
        for &c in &children[i] {
            let span = sector_span[i] * weight[c] as f64 / total as f64;
            sector_start[c] = cursor;
            sector_span[c] = span;
            angle[c] = cursor + span / 2.0;
            cursor += span;
        }
    }

    let mut tree = RadialTree {
        root: Some(adj.id(root).clone()),
        max_depth: order.iter().filter_map(|&i| depth[i]).max().unwrap_or(0),
        ..RadialTree::default()
    };

    for &i in &order {
        let d = depth[i].unwrap_or(0);
        let radius = d as f64 * opts.ring_spacing;
        let id = adj.id(i).clone();
        tree.positions.insert(
            id.clone(),
            Point::new(
                opts.center_x + radius * angle[i].cos(),
                opts.center_y + radius * angle[i].sin(),
            ),
        );
        tree.placements.insert(
            id,
            TreePlacement {
                depth: d,
                parent: parent[i].map(|p| adj.id(p).clone()),
                weight: weight[i],
                sector_start: sector_start[i],
                sector_span: sector_span[i],
                angle: angle[i],
            },
        );
    }

    tree.disconnected = (0..n)
        .filter(|&i| depth[i].is_none())
        .map(|i| adj.id(i).clone())
        .collect();
    place_fallback_row(&mut tree, opts);
    tree
}

// Unreached nodes go in a centered row one ring below the deepest ring.
fn place_fallback_row(tree: &mut RadialTree, opts: &RadialOptions) {
    let count = tree.disconnected.len();
    if count == 0 {
        return;
    }
    let y = opts.center_y + (tree.max_depth + 1) as f64 * opts.ring_spacing;
    let x0 = opts.center_x - (count - 1) as f64 * opts.node_width / 2.0;
    for (i, id) in tree.disconnected.iter().enumerate() {
        tree.positions
            .insert(id.clone(), Point::new(x0 + i as f64 * opts.node_width, y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridreplay_core::{TopologyEdge, TopologyNode};

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn chain_abc() -> Topology {
        Topology::new(
            vec![
                TopologyNode::bus("A", Some(33.0)),
                TopologyNode::bus("B", Some(11.0)),
                TopologyNode::bus("C", Some(0.4)),
            ],
            vec![
                TopologyEdge::line("Line.AB", "A", "B"),
                TopologyEdge::transformer("Transformer.BC", "B", "C"),
            ],
        )
    }

    #[test]
    fn layout_is_deterministic() {
        let topo = chain_abc();
        let opts = RadialOptions::default();
        assert_eq!(layout(&topo, &opts), layout(&topo, &opts));
    }

    #[test]
    fn root_is_highest_voltage_class() {
        let topo = Topology::new(
            vec![
                TopologyNode::bus("lv11", Some(11.0)),
                TopologyNode::bus("hv33", Some(33.0)),
                TopologyNode::bus("lv04", Some(0.4)),
            ],
            vec![
                TopologyEdge::line("Line.1", "lv11", "hv33"),
                TopologyEdge::line("Line.2", "lv11", "lv04"),
            ],
        );

        let tree = layout_tree(&topo, &RadialOptions::default());

        assert_eq!(tree.root, Some(id("hv33")));
        assert_eq!(tree.placements[&id("lv04")].depth, 2);
    }

    #[test]
    fn root_ties_and_missing_kv_fall_back_to_input_order() {
        let tied = Topology::new(
            vec![
                TopologyNode::bus("x", Some(11.0)),
                TopologyNode::bus("y", Some(11.0)),
            ],
            vec![],
        );
        assert_eq!(
            layout_tree(&tied, &RadialOptions::default()).root,
            Some(id("x"))
        );

        let bare = Topology::new(
            vec![TopologyNode::bus("p", None), TopologyNode::bus("q", None)],
            vec![TopologyEdge::line("Line.pq", "p", "q")],
        );
        assert_eq!(
            layout_tree(&bare, &RadialOptions::default()).root,
            Some(id("p"))
        );
    }

    #[test]
    fn sectors_follow_subtree_weight() {
        let topo = Topology::new(
            vec![
                TopologyNode::bus("root", Some(33.0)),
                TopologyNode::bus("leaf", None),
                TopologyNode::bus("hub", None),
                TopologyNode::bus("h1", None),
                TopologyNode::bus("h2", None),
                TopologyNode::bus("h3", None),
            ],
            vec![
                TopologyEdge::line("Line.1", "root", "leaf"),
                TopologyEdge::line("Line.2", "root", "hub"),
                TopologyEdge::line("Line.3", "hub", "h1"),
                TopologyEdge::line("Line.4", "hub", "h2"),
                TopologyEdge::line("Line.5", "hub", "h3"),
            ],
        );

        let tree = layout_tree(&topo, &RadialOptions::default());
        let leaf = &tree.placements[&id("leaf")];
        let hub = &tree.placements[&id("hub")];

        assert_eq!(leaf.weight, 1);
        assert_eq!(hub.weight, 4);
        assert!((hub.sector_span / leaf.sector_span - 4.0).abs() < 1e-9);
        assert!((leaf.sector_span - TAU / 5.0).abs() < 1e-9);
        assert!((leaf.angle - TAU / 10.0).abs() < 1e-9);
        // The hub's three children share its sector evenly.
        let h1 = &tree.placements[&id("h1")];
        assert!((h1.sector_span - hub.sector_span / 3.0).abs() < 1e-9);
        assert!((h1.sector_start - hub.sector_start).abs() < 1e-9);
    }

    #[test]
    fn disconnected_nodes_sit_in_a_row_outside_the_field() {
        let mut topo = chain_abc();
        topo.nodes.push(TopologyNode::bus("island1", None));
        topo.nodes.push(TopologyNode::bus("island2", None));
        let opts = RadialOptions::default();

        let tree = layout_tree(&topo, &opts);
        let center = Point::new(opts.center_x, opts.center_y);
        let p1 = tree.positions[&id("island1")];
        let p2 = tree.positions[&id("island2")];

        assert_eq!(tree.disconnected, vec![id("island1"), id("island2")]);
        assert_eq!(tree.positions.len(), 5);
        assert!(center.distance(p1) > tree.field_radius(&opts));
        assert!(center.distance(p2) > tree.field_radius(&opts));
        assert_eq!(p1.y, p2.y);
        assert_eq!(p2.x - p1.x, opts.node_width);
        for placed in ["A", "B", "C"] {
            assert!(tree.positions[&id(placed)].distance(p1) > 1.0);
        }
    }

    #[test]
    fn chain_depths_map_to_rings() {
        let opts = RadialOptions {
            center_x: 400.0,
            center_y: 300.0,
            ring_spacing: 50.0,
            node_width: 60.0,
        };
        let tree = layout_tree(&chain_abc(), &opts);
        let center = Point::new(400.0, 300.0);

        assert_eq!(tree.placements[&id("A")].depth, 0);
        assert_eq!(tree.placements[&id("B")].depth, 1);
        assert_eq!(tree.placements[&id("C")].depth, 2);
        assert_eq!(tree.positions[&id("A")], center);
        assert!((center.distance(tree.positions[&id("C")]) - 2.0 * 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_topology_yields_no_positions() {
        let tree = layout_tree(&Topology::default(), &RadialOptions::default());
        assert!(tree.positions.is_empty());
        assert_eq!(tree.root, None);
    }

    #[test]
    fn edges_to_unknown_nodes_are_ignored() {
        let mut topo = chain_abc();
        topo.edges.push(TopologyEdge::line("Line.ghost", "C", "ghost"));

        let positions = layout(&topo, &RadialOptions::default());

        assert_eq!(positions.len(), 3);
        assert!(!positions.contains_key(&id("ghost")));
    }
}
