use graph::{MinimizedGraph, UNREACHABLE_DISTANCE};
use heapscope_core::config::DEFAULT_LEAK_POINT_LIMIT;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A node flagged for investigation, with its retained size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakPoint {
    pub index: usize,
    pub size: u64,
}

/// Keeps the `limit` largest retained sizes among nodes that are neither
/// the root, adjacent to it, nor unreachable.
#[derive(Debug, Clone, Copy)]
pub struct LeakPointSelector {
    limit: usize,
}

impl LeakPointSelector {
    /// `None` and `Some(0)` fall back to the default limit.
    pub fn new(limit: Option<usize>) -> Self {
        let limit = match limit {
            Some(n) if n > 0 => n,
            _ => DEFAULT_LEAK_POINT_LIMIT,
        };
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Single pass over every node with a bounded min-heap.
    /// Result is ordered by size descending, then index ascending.
    pub fn select(&self, graph: &MinimizedGraph, root_index: usize) -> Vec<LeakPoint> {
        let mut kept: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::with_capacity(self.limit);

        let candidates = graph
            .retained_sizes()
            .iter()
            .zip(graph.node_distances())
            .enumerate();
        for (index, (&size, &distance)) in candidates {
            if index == root_index || distance <= 1 || distance >= UNREACHABLE_DISTANCE {
                continue;
            }

            if kept.len() < self.limit {
                kept.push(Reverse((size, index)));
            } else if let Some(mut smallest) = kept.peek_mut() {
                if size > smallest.0 .0 {
                    *smallest = Reverse((size, index));
                }
            }
        }

        let mut leak_points: Vec<LeakPoint> = kept
            .into_iter()
            .map(|Reverse((size, index))| LeakPoint { index, size })
            .collect();
        leak_points.sort_by(|a, b| b.size.cmp(&a.size).then(a.index.cmp(&b.index)));
        leak_points
    }
}

impl Default for LeakPointSelector {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::{GraphReducer, HeapGraph, NodeMetrics};
    use heapscope_core::model::SnapshotPayload;

    /// Edge-less graph: node 0 is the root, the rest take `(distance, size)`.
    fn flat_graph(candidates: &[(u32, u64)]) -> MinimizedGraph {
        let count = candidates.len() + 1;
        let nodes = (0..count as u64)
            .flat_map(|id| [3, 0, id * 2 + 1, 0, 0, 0])
            .collect();
        let mut metrics = NodeMetrics {
            retained_sizes: vec![u64::MAX],
            distances: vec![0],
        };
        for &(distance, size) in candidates {
            metrics.distances.push(distance);
            metrics.retained_sizes.push(size);
        }
        let payload = SnapshotPayload {
            nodes,
            strings: vec![String::new()],
            ..SnapshotPayload::default()
        };
        GraphReducer::reduce(HeapGraph::from_payload(payload, metrics).unwrap()).unwrap()
    }

    #[test]
    fn test_scenario_distance_exclusions() {
        let graph = flat_graph(&[
            (2, 10),
            (2, 90),
            (3, 5),
            (1, 1000),
            (5, 7),
            (UNREACHABLE_DISTANCE, 3),
        ]);
        let picked = LeakPointSelector::new(Some(2)).select(&graph, 0);
        assert_eq!(
            picked,
            vec![
                LeakPoint { index: 2, size: 90 },
                LeakPoint { index: 1, size: 10 },
            ]
        );
    }

    #[test]
    fn test_root_is_never_selected() {
        let graph = flat_graph(&[(2, 1), (2, 2)]);
        // pretend node 2 is the root
        let picked = LeakPointSelector::new(Some(5)).select(&graph, 2);
        assert_eq!(picked, vec![LeakPoint { index: 1, size: 1 }]);
    }

    #[test]
    fn test_zero_or_missing_limit_defaults_to_five() {
        assert_eq!(LeakPointSelector::new(None).limit(), 5);
        assert_eq!(LeakPointSelector::new(Some(0)).limit(), 5);

        let graph = flat_graph(&[(2, 1); 9]);
        assert_eq!(LeakPointSelector::new(Some(0)).select(&graph, 0).len(), 5);
    }

    #[test]
    fn test_ties_do_not_evict() {
        let graph = flat_graph(&[(2, 7), (2, 7), (2, 7)]);
        let picked = LeakPointSelector::new(Some(2)).select(&graph, 0);
        // equal sizes never displace an earlier candidate
        assert_eq!(
            picked,
            vec![LeakPoint { index: 1, size: 7 }, LeakPoint { index: 2, size: 7 }]
        );
    }

    #[test]
    fn test_fewer_eligible_than_limit() {
        let graph = flat_graph(&[(1, 4), (3, 8)]);
        let picked = LeakPointSelector::new(Some(10)).select(&graph, 0);
        assert_eq!(picked, vec![LeakPoint { index: 2, size: 8 }]);
    }
}
