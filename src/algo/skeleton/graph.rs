//! Proximity graph and minimum spanning forest over skeleton points.

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::error::{Result, TraceError};
use crate::geometry::SkeletonPoint;

type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// Candidate edge between two points, by index into the point slice.
///
/// Only lives for the duration of a build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GraphEdge {
    pub(crate) a: usize,
    pub(crate) b: usize,
    pub(crate) weight: f64,
}

/// Weighted proximity graph: every pair of points within the edge range.
#[derive(Debug, Clone)]
pub(crate) struct SkeletonGraph {
    num_nodes: usize,
    /// Sorted by `(weight, a, b)`.
    edges: Vec<GraphEdge>,
}

impl SkeletonGraph {
    /// Connect every pair of points closer than `edge_range`.
    ///
    /// Edge weight is `distance^power` scaled by the mean cost of the two
    /// endpoints. Edges come out sorted by weight, then by point index, so
    /// the spanning forest does not depend on thread scheduling.
    pub(crate) fn new(
        points: &[SkeletonPoint],
        edge_range: f64,
        power: f64,
        parallel: bool,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(TraceError::EmptyInput);
        }

        let coords: Vec<[f64; 3]> = points
            .iter()
            .map(|p| [p.position.x, p.position.y, p.position.z])
            .collect();
        let tree = RTree::bulk_load(
            coords
                .iter()
                .enumerate()
                .map(|(i, &c)| IndexedPoint::new(c, i))
                .collect(),
        );
        let max_sq = edge_range * edge_range;

        let edges_from = |i: usize| -> Vec<GraphEdge> {
            tree.locate_within_distance(coords[i], max_sq)
                .filter(|hit| hit.data > i)
                .map(|hit| {
                    let j = hit.data;
                    let distance = (points[j].position - points[i].position).norm();
                    let cost = 0.5 * (points[i].cost + points[j].cost);
                    GraphEdge {
                        a: i,
                        b: j,
                        weight: distance.powf(power) * cost,
                    }
                })
                .collect()
        };

        let mut edges: Vec<GraphEdge> = if parallel {
            (0..points.len())
                .into_par_iter()
                .flat_map_iter(|i| edges_from(i))
                .collect()
        } else {
            (0..points.len()).flat_map(|i| edges_from(i)).collect()
        };
        edges.sort_by(|x, y| {
            x.weight
                .total_cmp(&y.weight)
                .then(x.a.cmp(&y.a))
                .then(x.b.cmp(&y.b))
        });

        log::debug!(
            "proximity graph: {} points, {} edges within {}",
            points.len(),
            edges.len(),
            edge_range
        );
        Ok(Self {
            num_nodes: points.len(),
            edges,
        })
    }

    #[cfg(test)]
    pub(crate) fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Kruskal's algorithm over the sorted edge list.
    pub(crate) fn spanning_forest(&self) -> SpanningTree {
        let mut uf = UnionFind::<usize>::new(self.num_nodes);
        let mut tree = SpanningTree::new(self.num_nodes);
        let mut accepted = 0usize;
        for e in &self.edges {
            if uf.union(e.a, e.b) {
                tree.add_edge(e.a, e.b, e.weight);
                accepted += 1;
                if accepted + 1 == self.num_nodes {
                    break;
                }
            }
        }
        tree
    }
}

/// An acyclic adjacency structure whose nodes can be removed.
#[derive(Debug, Clone)]
pub(crate) struct SpanningTree {
    adjacency: Vec<Vec<(usize, f64)>>,
    alive: Vec<bool>,
}

impl SpanningTree {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_nodes],
            alive: vec![true; num_nodes],
        }
    }

    pub(crate) fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        self.adjacency[a].push((b, weight));
        self.adjacency[b].push((a, weight));
    }

    #[inline]
    pub(crate) fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    #[inline]
    pub(crate) fn is_alive(&self, node: usize) -> bool {
        self.alive[node]
    }

    #[inline]
    pub(crate) fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    /// Neighbors with edge weights.
    #[inline]
    pub(crate) fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    #[cfg(test)]
    pub(crate) fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Remove a node and every edge touching it.
    pub(crate) fn remove_node(&mut self, node: usize) {
        let incident = std::mem::take(&mut self.adjacency[node]);
        for (other, _) in incident {
            self.adjacency[other].retain(|&(n, _)| n != node);
        }
        self.alive[node] = false;
    }

    /// Connected components of live nodes.
    ///
    /// Each component is sorted ascending; components are ordered by their
    /// smallest node.
    pub(crate) fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.num_nodes()];
        let mut out = Vec::new();
        for start in 0..self.num_nodes() {
            if seen[start] || !self.alive[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            seen[start] = true;
            while let Some(node) = stack.pop() {
                component.push(node);
                for &(next, _) in &self.adjacency[node] {
                    if !seen[next] {
                        seen[next] = true;
                        stack.push(next);
                    }
                }
            }
            component.sort_unstable();
            out.push(component);
        }
        out
    }
}
