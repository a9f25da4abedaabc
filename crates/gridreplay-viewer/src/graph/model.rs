use gridreplay_core::{NodeId, Topology};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(a: Point, b: Point) -> Point {
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    #[cfg(test)]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Undirected adjacency over the topology's unique node ids, indexed in
/// topology order. Neighbor lists are sets kept in edge order, so parallel
/// edges collapse and self-loops are dropped.
#[derive(Debug, Default)]
pub struct Adjacency<'a> {
    ids: Vec<&'a NodeId>,
    kv: Vec<Option<f64>>,
    index: HashMap<&'a NodeId, usize>,
    neighbors: Vec<Vec<usize>>,
}

impl<'a> Adjacency<'a> {
    pub fn from_topology(topology: &'a Topology) -> Self {
        let mut adj = Adjacency::default();
        for node in &topology.nodes {
            if adj.index.contains_key(&node.id) {
                continue;
            }
            adj.index.insert(&node.id, adj.ids.len());
            adj.ids.push(&node.id);
            adj.kv.push(node.kv);
            adj.neighbors.push(Vec::new());
        }

        for edge in &topology.edges {
            let (Some(&a), Some(&b)) = (adj.index.get(&edge.source), adj.index.get(&edge.target))
            else {
                continue;
            };
            if a == b {
                continue;
            }
            if !adj.neighbors[a].contains(&b) {
                adj.neighbors[a].push(b);
            }
            if !adj.neighbors[b].contains(&a) {
                adj.neighbors[b].push(a);
            }
        }
        adj
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn id(&self, idx: usize) -> &'a NodeId {
        self.ids[idx]
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.neighbors[idx]
    }

    /// Highest declared voltage class wins, first in topology order on ties.
    /// Missing or non-finite kv counts as 0, so a kv-less topology roots at
    /// its first node.
    pub fn pick_root(&self) -> Option<usize> {
        let kv_of = |i: usize| self.kv[i].filter(|v| v.is_finite()).unwrap_or(0.0);
        (0..self.len()).fold(None, |best, i| match best {
            Some(b) if kv_of(i) <= kv_of(b) => Some(b),
            _ => Some(i),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridreplay_core::{TopologyEdge, TopologyNode};

    #[test]
    fn parallel_edges_and_self_loops_collapse() {
        let topo = Topology::new(
            vec![TopologyNode::bus("a", None), TopologyNode::bus("b", None)],
            vec![
                TopologyEdge::line("Line.1", "a", "b"),
                TopologyEdge::line("Line.2", "b", "a"),
                TopologyEdge::line("Line.3", "b", "b"),
            ],
        );

        let adj = Adjacency::from_topology(&topo);

        assert_eq!(adj.neighbors(0), &[1]);
        assert_eq!(adj.neighbors(1), &[0]);
    }

    #[test]
    fn duplicate_node_ids_keep_first_occurrence() {
        let topo = Topology::new(
            vec![
                TopologyNode::bus("a", Some(1.0)),
                TopologyNode::bus("a", Some(99.0)),
                TopologyNode::bus("b", Some(2.0)),
            ],
            vec![],
        );

        let adj = Adjacency::from_topology(&topo);

        assert_eq!(adj.len(), 2);
        assert_eq!(adj.pick_root().map(|i| adj.id(i).0.as_str()), Some("b"));
    }

    #[test]
    fn midpoint_and_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(6.0, 8.0);
        assert_eq!(Point::midpoint(a, b), Point::new(3.0, 4.0));
        assert_eq!(a.distance(b), 10.0);
    }
}
