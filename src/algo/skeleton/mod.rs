//! Skeleton graph builder: from unordered skeleton points to a trace forest.
//!
//! # Pipeline
//!
//! 1. Drop non-finite and duplicate points
//! 2. Connect every pair of points within `edge_range`, weighted by
//!    `distance^power` times the mean point cost
//! 3. Minimum spanning forest (Kruskal, ties broken by point index)
//! 4. Erode short spurs until a fixed point or the iteration cap
//! 5. Per component, take the longest weighted path as the trunk and turn
//!    the remaining subtrees into child lines
//!
//! Every component becomes its own root. The result does not depend on
//! whether the parallel paths are enabled.
//!
//! # Example
//!
//! ```
//! use filament::algo::skeleton::{build_forest, SkeletonOptions};
//! use filament::geometry::GeometryStore;
//! use nalgebra::Point3;
//!
//! let positions: Vec<_> = (0..20).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
//! let store = GeometryStore::from_positions(&positions);
//!
//! let forest = build_forest(&store, &SkeletonOptions::default()).unwrap();
//! assert_eq!(forest.num_lines(), 1);
//! assert_eq!(forest.num_bits(), 20);
//! ```

mod backbone;
mod graph;
mod prune;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use self::backbone::{decompose, Segment};
use self::graph::SkeletonGraph;
use super::Progress;
use crate::error::{Result, TraceError};
use crate::geometry::{GeometryStore, LineId, SkeletonPoint};
use crate::trace::{Forest, TraceBit};

/// Options for [`build_forest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonOptions {
    /// Maximum distance between two points for them to be connected.
    pub edge_range: f64,

    /// Exponent applied to the distance in the edge weight.
    pub power: f64,

    /// Spurs shorter than this are pruned (0 disables pruning).
    pub min_branch_length: f64,

    /// Cap on spur-pruning passes.
    pub max_prune_iterations: usize,

    /// Components with fewer points than this are dropped.
    pub min_component_size: usize,

    /// Points closer than this are treated as duplicates.
    pub dedup_epsilon: f64,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        Self {
            edge_range: 10.0,
            power: 1.0,
            min_branch_length: 50.0,
            max_prune_iterations: 100,
            min_component_size: 1,
            dedup_epsilon: 1e-6,
            parallel: true,
        }
    }
}

impl SkeletonOptions {
    /// Set the connection radius.
    pub fn with_edge_range(mut self, edge_range: f64) -> Self {
        self.edge_range = edge_range;
        self
    }

    /// Set the distance exponent.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Set the spur-pruning threshold.
    pub fn with_min_branch_length(mut self, length: f64) -> Self {
        self.min_branch_length = length;
        self
    }

    /// Set the pruning pass cap.
    pub fn with_max_prune_iterations(mut self, iterations: usize) -> Self {
        self.max_prune_iterations = iterations;
        self
    }

    /// Set the minimum component size.
    pub fn with_min_component_size(mut self, size: usize) -> Self {
        self.min_component_size = size;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.edge_range.is_finite() && self.edge_range > 0.0) {
            return Err(TraceError::invalid_param(
                "edge_range",
                self.edge_range,
                "must be positive and finite",
            ));
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(TraceError::invalid_param(
                "power",
                self.power,
                "must be positive and finite",
            ));
        }
        if !(self.min_branch_length >= 0.0) {
            return Err(TraceError::invalid_param(
                "min_branch_length",
                self.min_branch_length,
                "must be non-negative",
            ));
        }
        if !(self.dedup_epsilon > 0.0) {
            return Err(TraceError::invalid_param(
                "dedup_epsilon",
                self.dedup_epsilon,
                "must be positive",
            ));
        }
        Ok(())
    }
}

const STAGES: usize = 5;

/// Build a trace forest from skeleton points.
///
/// Empty input (or input that is empty after removing non-finite points)
/// yields an empty forest.
///
/// # Errors
///
/// [`TraceError::InvalidParameter`] if the options are out of range.
pub fn build_forest(store: &GeometryStore, options: &SkeletonOptions) -> Result<Forest> {
    build_internal(store, options, None)
}

/// Build a trace forest with progress reporting.
///
/// # Errors
///
/// As [`build_forest`], plus [`TraceError::Aborted`] if the progress
/// reporter is cancelled between stages.
pub fn build_forest_with_progress(
    store: &GeometryStore,
    options: &SkeletonOptions,
    progress: &Progress,
) -> Result<Forest> {
    build_internal(store, options, Some(progress))
}

fn build_internal(
    store: &GeometryStore,
    options: &SkeletonOptions,
    progress: Option<&Progress>,
) -> Result<Forest> {
    options.validate()?;
    let stage = |step: usize, message: &str| -> Result<()> {
        if let Some(p) = progress {
            p.checkpoint(message)?;
            p.report(step, STAGES, message);
        }
        Ok(())
    };

    stage(0, "Deduplicating points")?;
    let store = store.deduplicated(options.dedup_epsilon);
    let points = store.points();

    stage(1, "Building proximity graph")?;
    let graph = match SkeletonGraph::new(points, options.edge_range, options.power, options.parallel) {
        Ok(graph) => graph,
        Err(TraceError::EmptyInput) => {
            log::info!("no skeleton points, returning an empty forest");
            return Ok(Forest::new());
        }
        Err(e) => return Err(e),
    };

    stage(2, "Computing spanning forest")?;
    let mut tree = graph.spanning_forest();

    stage(3, "Pruning spurs")?;
    let pruned = prune::prune_spurs(
        &mut tree,
        points,
        options.min_branch_length,
        options.max_prune_iterations,
    );

    stage(4, "Extracting backbones")?;
    let components: Vec<Vec<usize>> = tree
        .components()
        .into_iter()
        .filter(|c| c.len() >= options.min_component_size)
        .collect();
    let decomposed: Vec<Vec<Segment>> = if options.parallel {
        components.par_iter().map(|c| decompose(&tree, c)).collect()
    } else {
        components.iter().map(|c| decompose(&tree, c)).collect()
    };

    let mut forest = Forest::new();
    for segments in &decomposed {
        insert_segments(&mut forest, points, segments)?;
    }
    if let Some(p) = progress {
        p.report(STAGES, STAGES, "Done");
    }

    log::info!(
        "built {} trace lines in {} trees from {} points ({} pruned)",
        forest.num_lines(),
        forest.roots().len(),
        points.len(),
        pruned
    );
    Ok(forest)
}

/// Add one component's segments, which are in pre-order.
fn insert_segments(forest: &mut Forest, points: &[SkeletonPoint], segments: &[Segment]) -> Result<()> {
    let mut ids: Vec<LineId> = Vec::with_capacity(segments.len());
    for segment in segments {
        let bits: Vec<TraceBit> = segment.nodes.iter().map(|&i| TraceBit::from(&points[i])).collect();
        let id = match segment.parent {
            None => forest.add_root(bits)?,
            Some(p) => {
                let parent = ids
                    .get(p)
                    .copied()
                    .ok_or_else(|| TraceError::InvalidState(format!("segment parent {} not built", p)))?;
                forest.add_child(parent, bits)?
            }
        };
        ids.push(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Marker;
    use nalgebra::Point3;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Trunk along x from 0 to 40 (step 1) with a long branch off x=20
    /// running along y, and a 2-point spur off x=10.
    fn branching_store() -> GeometryStore {
        let mut store = GeometryStore::new();
        for i in 0..=40 {
            store.push(Point3::new(i as f64, 0.0, 0.0));
        }
        for k in 1..=15 {
            store.push(Point3::new(20.0, k as f64, 0.0));
        }
        store.push(Point3::new(10.0, -1.0, 0.0));
        store.push(Point3::new(10.0, -2.0, 0.0));
        store
    }

    fn options() -> SkeletonOptions {
        SkeletonOptions::default()
            .with_edge_range(1.5)
            .with_min_branch_length(5.0)
    }

    #[test]
    fn test_straight_line_one_trace() {
        let positions: Vec<_> = (0..25).map(|i| Point3::new(0.0, 2.0 * i as f64, 1.0)).collect();
        let store = GeometryStore::from_positions(&positions);
        let forest = build_forest(&store, &SkeletonOptions::default().with_edge_range(2.0)).unwrap();
        assert_eq!(forest.num_lines(), 1);
        let line = forest.line(forest.roots()[0]).unwrap();
        let markers: Vec<_> = line.markers().collect();
        let expected: Vec<_> = (0..25).map(Marker::new).collect();
        assert_eq!(markers, expected);
    }

    #[test]
    fn test_empty_input_gives_empty_forest() {
        let forest = build_forest(&GeometryStore::new(), &SkeletonOptions::default()).unwrap();
        assert!(forest.is_empty());
    }

    #[test]
    fn test_branch_and_spur() {
        let store = branching_store();
        let forest = build_forest(&store, &options()).unwrap();
        forest.validate().unwrap();

        // Spur pruned: 41 + 15 points kept.
        assert_eq!(forest.num_bits(), 56);
        assert!(forest.line_of(Marker::new(56)).is_none());

        // Trunk split at the junction: root [0..=20], children [21..=40] and the branch.
        assert_eq!(forest.num_lines(), 3);
        let root = forest.line(forest.roots()[0]).unwrap();
        assert_eq!(root.head().unwrap().marker, Marker::new(0));
        assert_eq!(root.tail().unwrap().marker, Marker::new(20));
        let children = root.children();
        assert_eq!(forest.line(children[0]).unwrap().num_bits(), 20);
        assert_eq!(forest.line(children[1]).unwrap().num_bits(), 15);
    }

    #[test]
    fn test_disconnected_components_become_roots() {
        let mut store = GeometryStore::new();
        for i in 0..5 {
            store.push(Point3::new(i as f64, 0.0, 0.0));
        }
        for i in 0..5 {
            store.push(Point3::new(i as f64, 50.0, 0.0));
        }
        store.push(Point3::new(0.0, 0.0, 90.0));
        let forest = build_forest(&store, &options()).unwrap();
        assert_eq!(forest.roots().len(), 3);

        let dropped = build_forest(&store, &options().with_min_component_size(2)).unwrap();
        assert_eq!(dropped.roots().len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let store = branching_store();
        let par = build_forest(&store, &options()).unwrap();
        let seq = build_forest(&store, &options().with_parallel(false)).unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn test_duplicates_are_tolerated() {
        let mut store = GeometryStore::new();
        for i in 0..6 {
            store.push(Point3::new(i as f64, 0.0, 0.0));
            store.push(Point3::new(i as f64, 0.0, 0.0));
        }
        let forest = build_forest(&store, &options()).unwrap();
        assert_eq!(forest.num_lines(), 1);
        assert_eq!(forest.num_bits(), 6);
    }

    #[test]
    fn test_non_finite_costs_are_tolerated() {
        let text = "0 0 0 1 nan\n1 0 0 1 nan\n2 0 0 1 inf\n3 0 0 1 nan\n";
        let store = crate::io::points::from_reader(text.as_bytes()).unwrap();
        assert!(store.points()[0].cost.is_nan());

        let forest = build_forest(&store, &options()).unwrap();
        assert_eq!(forest.num_lines(), 1);
        let markers: Vec<usize> = forest.lines().next().unwrap().markers().map(|m| m.index()).collect();
        assert_eq!(markers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_invalid_options() {
        let store = branching_store();
        let err = build_forest(&store, &options().with_edge_range(-1.0)).unwrap_err();
        assert!(matches!(err, TraceError::InvalidParameter { name: "edge_range", .. }));
    }

    #[test]
    fn test_progress_and_cancel() {
        let store = branching_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        build_forest_with_progress(&store, &options(), &progress).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), STAGES + 1);

        progress.cancel_token().cancel();
        assert!(matches!(
            build_forest_with_progress(&store, &options(), &progress),
            Err(TraceError::Aborted { .. })
        ));
    }
}
