//! Gap reconnection scoring.
//!
//! A gap is a candidate merge between two free trace-line endpoints on
//! different lines. Candidates are scored by
//!
//! ```text
//! cost = distance / max_gap + angle_weight * angle / π
//! ```
//!
//! where `angle` is the deviation between the two terminal directions (0 for
//! a perfectly continuing pair, π for a pair doubling back on itself).
//!
//! Conflict resolution walks the candidates from cheapest to most expensive
//! and accepts a gap only if neither endpoint is taken yet and the merge is
//! still valid after every gap accepted before it, so the accepted list can
//! be merged in order without failures. Everything rejected is counted as a
//! conflict.
//!
//! The scorer never mutates the forest. After merging, endpoints change and
//! gaps have to be recomputed.
//!
//! # Example
//!
//! ```
//! use filament::algo::gaps::{compute_gaps, GapOptions};
//! use filament::geometry::Marker;
//! use filament::trace::{Forest, TraceBit};
//! use nalgebra::Point3;
//!
//! let bits = |first: usize, xs: std::ops::RangeInclusive<usize>| -> Vec<TraceBit> {
//!     xs.enumerate()
//!         .map(|(k, x)| TraceBit::new(Marker::new(first + k), Point3::new(x as f64, 0.0, 0.0), 1.0))
//!         .collect()
//! };
//! let mut forest = Forest::new();
//! forest.add_root(bits(0, 0..=5)).unwrap();
//! forest.add_root(bits(100, 6..=10)).unwrap();
//!
//! let report = compute_gaps(&forest, &[], &GapOptions::default().with_max_gap(2.0)).unwrap();
//! assert_eq!(report.gaps.len(), 1);
//! assert_eq!(report.gaps[0].end_pt1, Marker::new(5));
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::f64::consts::PI;

use nalgebra::{Point3, Unit, Vector3};
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};

use super::Progress;
use crate::error::{Result, TraceError};
use crate::geometry::{LineId, Marker};
use crate::trace::{End, Forest, TraceLine};

/// Options for [`compute_gaps`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapOptions {
    /// Endpoints farther apart than this are never paired.
    pub max_gap: f64,

    /// Highest cost a candidate may have to be considered.
    pub tolerance: f64,

    /// Weight of the angular term relative to the distance term.
    pub angle_weight: f64,

    /// Abort if more candidates than this are found.
    pub candidate_limit: Option<usize>,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for GapOptions {
    fn default() -> Self {
        Self {
            max_gap: 10.0,
            tolerance: 1.5,
            angle_weight: 1.0,
            candidate_limit: None,
            parallel: true,
        }
    }
}

impl GapOptions {
    /// Set the maximum endpoint distance.
    pub fn with_max_gap(mut self, max_gap: f64) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Set the cost ceiling.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the angular weight.
    pub fn with_angle_weight(mut self, weight: f64) -> Self {
        self.angle_weight = weight;
        self
    }

    /// Abort when more than `limit` candidates are found.
    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = Some(limit);
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_gap.is_finite() && self.max_gap > 0.0) {
            return Err(TraceError::invalid_param(
                "max_gap",
                self.max_gap,
                "must be positive and finite",
            ));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(TraceError::invalid_param(
                "tolerance",
                self.tolerance,
                "must be non-negative",
            ));
        }
        if !(self.angle_weight.is_finite() && self.angle_weight >= 0.0) {
            return Err(TraceError::invalid_param(
                "angle_weight",
                self.angle_weight,
                "must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

/// A candidate reconnection between two free endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Endpoint marker on `trace1`.
    pub end_pt1: Marker,
    /// Endpoint marker on `trace2`.
    pub end_pt2: Marker,
    /// The line holding `end_pt1`; always the smaller id of the two.
    pub trace1: LineId,
    /// The line holding `end_pt2`.
    pub trace2: LineId,
    /// Euclidean distance between the endpoints.
    pub distance: f64,
    /// Deviation between the terminal directions, in radians.
    pub angle: f64,
    /// Combined score; lower is better.
    pub cost: f64,
    /// Conflict cluster: gaps competing for overlapping endpoints share it.
    pub comp_id: usize,
}

/// Result of [`compute_gaps`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Accepted gaps, cheapest first; no two share an endpoint.
    pub gaps: Vec<Gap>,
    /// Number of candidates within range and tolerance.
    pub candidates: usize,
    /// Candidates discarded during conflict resolution.
    pub conflicts: usize,
}

impl GapReport {
    /// Accepted gaps belonging to any of the given clusters.
    pub fn in_components<'a>(&'a self, comp_ids: &'a [usize]) -> impl Iterator<Item = &'a Gap> + 'a {
        self.gaps.iter().filter(move |g| comp_ids.contains(&g.comp_id))
    }

    /// Accepted gaps with cost at most `max_cost`.
    pub fn below_cost(&self, max_cost: f64) -> impl Iterator<Item = &Gap> + '_ {
        self.gaps.iter().filter(move |g| g.cost <= max_cost)
    }
}

/// A free end of a trace line.
#[derive(Debug, Clone)]
struct Endpoint {
    marker: Marker,
    line: LineId,
    position: Point3<f64>,
    direction: Option<Unit<Vector3<f64>>>,
}

fn free_endpoints(line: &TraceLine) -> Vec<Endpoint> {
    let ends: &[End] = match (line.num_bits(), line.is_root(), line.is_leaf()) {
        (0, _, _) => &[],
        (1, true, _) => &[End::Head],
        (1, false, true) => &[End::Tail],
        (_, true, true) => &[End::Head, End::Tail],
        (_, true, false) => &[End::Head],
        (_, false, true) => &[End::Tail],
        (_, false, false) => &[],
    };
    ends.iter()
        .filter_map(|&end| {
            let bit = line.end_bit(end)?;
            Some(Endpoint {
                marker: bit.marker,
                line: line.id(),
                position: bit.position,
                direction: line.end_direction(end),
            })
        })
        .collect()
}

/// Angle between two outward end directions, measured so that two ends
/// pointing at each other give 0.
fn deviation(a: Option<Unit<Vector3<f64>>>, b: Option<Unit<Vector3<f64>>>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (-a.dot(&b)).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

fn compare_gaps(x: &Gap, y: &Gap) -> Ordering {
    x.cost
        .total_cmp(&y.cost)
        .then(x.trace1.cmp(&y.trace1))
        .then(x.trace2.cmp(&y.trace2))
        .then(x.end_pt1.cmp(&y.end_pt1))
        .then(x.end_pt2.cmp(&y.end_pt2))
}

const STAGES: usize = 3;

/// Propose merges between free endpoints of `lines` (all lines if empty).
///
/// # Errors
///
/// - [`TraceError::InvalidParameter`] if the options are out of range
/// - [`TraceError::LineNotFound`] if a requested line does not exist
/// - [`TraceError::Aborted`] if the candidate limit is exceeded
pub fn compute_gaps(forest: &Forest, lines: &[LineId], options: &GapOptions) -> Result<GapReport> {
    compute_internal(forest, lines, options, None)
}

/// [`compute_gaps`] with progress reporting and cancellation.
pub fn compute_gaps_with_progress(
    forest: &Forest,
    lines: &[LineId],
    options: &GapOptions,
    progress: &Progress,
) -> Result<GapReport> {
    compute_internal(forest, lines, options, Some(progress))
}

fn compute_internal(
    forest: &Forest,
    lines: &[LineId],
    options: &GapOptions,
    progress: Option<&Progress>,
) -> Result<GapReport> {
    options.validate()?;
    let stage = |step: usize, message: &str| -> Result<()> {
        if let Some(p) = progress {
            p.checkpoint(message)?;
            p.report(step, STAGES, message);
        }
        Ok(())
    };

    stage(0, "Collecting endpoints")?;
    let selected: Vec<&TraceLine> = if lines.is_empty() {
        forest.lines().collect()
    } else {
        lines
            .iter()
            .copied()
            .collect::<BTreeSet<LineId>>()
            .into_iter()
            .map(|id| forest.try_line(id))
            .collect::<Result<_>>()?
    };
    let endpoints: Vec<Endpoint> = selected.iter().flat_map(|l| free_endpoints(l)).collect();

    stage(1, "Scoring candidates")?;
    let candidates = score_candidates(forest, &endpoints, options, progress)?;
    if let Some(limit) = options.candidate_limit {
        if candidates.len() > limit {
            log::warn!("{} gap candidates exceed the limit of {}", candidates.len(), limit);
            return Err(TraceError::aborted(format!(
                "{} gap candidates exceed the limit of {}",
                candidates.len(),
                limit
            )));
        }
    }

    stage(2, "Resolving conflicts")?;
    let report = resolve_conflicts(forest, candidates);
    if let Some(p) = progress {
        p.report(STAGES, STAGES, "Done");
    }
    log::debug!(
        "gaps: {} endpoints, {} candidates, {} accepted, {} conflicts",
        endpoints.len(),
        report.candidates,
        report.gaps.len(),
        report.conflicts
    );
    Ok(report)
}

/// Endpoints scored between two cancellation checks.
const SCORE_CHUNK: usize = 1024;

/// Every valid endpoint pair within range and tolerance, sorted.
fn score_candidates(
    forest: &Forest,
    endpoints: &[Endpoint],
    options: &GapOptions,
    progress: Option<&Progress>,
) -> Result<Vec<Gap>> {
    let tree = RTree::bulk_load(
        endpoints
            .iter()
            .enumerate()
            .map(|(i, e)| GeomWithData::new([e.position.x, e.position.y, e.position.z], i))
            .collect(),
    );
    let max_sq = options.max_gap * options.max_gap;

    let pairs_from = |i: usize| -> Vec<Gap> {
        let a = &endpoints[i];
        tree.locate_within_distance([a.position.x, a.position.y, a.position.z], max_sq)
            .filter(|hit| hit.data > i)
            .filter_map(|hit| {
                let b = &endpoints[hit.data];
                if a.line == b.line || forest.plan_merge(a.marker, b.marker).is_err() {
                    return None;
                }
                let (a, b) = if a.line < b.line { (a, b) } else { (b, a) };
                let distance = (b.position - a.position).norm();
                let angle = deviation(a.direction, b.direction);
                let cost = distance / options.max_gap + options.angle_weight * angle / PI;
                (cost <= options.tolerance).then(|| Gap {
                    end_pt1: a.marker,
                    end_pt2: b.marker,
                    trace1: a.line,
                    trace2: b.line,
                    distance,
                    angle,
                    cost,
                    comp_id: 0,
                })
            })
            .collect()
    };

    let mut candidates: Vec<Gap> = Vec::new();
    for start in (0..endpoints.len()).step_by(SCORE_CHUNK) {
        if let Some(p) = progress {
            p.checkpoint("Scoring candidates")?;
            p.report_sub(start, endpoints.len(), 1, STAGES, "Scoring candidates");
        }
        let chunk = start..(start + SCORE_CHUNK).min(endpoints.len());
        if options.parallel {
            candidates.par_extend(chunk.into_par_iter().flat_map_iter(|i| pairs_from(i)));
        } else {
            candidates.extend(chunk.flat_map(|i| pairs_from(i)));
        }
    }
    candidates.sort_by(compare_gaps);
    Ok(candidates)
}

/// Greedy, single-threaded acceptance over sorted candidates.
fn resolve_conflicts(forest: &Forest, candidates: Vec<Gap>) -> GapReport {
    let total = candidates.len();

    // Cluster candidates that compete for an endpoint.
    let mut slots: HashMap<Marker, usize> = HashMap::new();
    for g in &candidates {
        for m in [g.end_pt1, g.end_pt2] {
            let next = slots.len();
            slots.entry(m).or_insert(next);
        }
    }
    let mut clusters = UnionFind::<usize>::new(slots.len());
    for g in &candidates {
        clusters.union(slots[&g.end_pt1], slots[&g.end_pt2]);
    }

    let mut scratch = forest.clone();
    let mut used: HashSet<Marker> = HashSet::new();
    let mut comp_ids: HashMap<usize, usize> = HashMap::new();
    let mut accepted = Vec::new();

    for mut gap in candidates {
        if used.contains(&gap.end_pt1) || used.contains(&gap.end_pt2) {
            continue;
        }
        if scratch.merge(gap.end_pt1, gap.end_pt2).is_err() {
            continue;
        }
        used.insert(gap.end_pt1);
        used.insert(gap.end_pt2);
        let cluster = clusters.find(slots[&gap.end_pt1]);
        let next = comp_ids.len();
        gap.comp_id = *comp_ids.entry(cluster).or_insert(next);
        accepted.push(gap);
    }

    GapReport {
        conflicts: total - accepted.len(),
        candidates: total,
        gaps: accepted,
    }
}
