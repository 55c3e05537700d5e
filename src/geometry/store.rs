//! The geometry store: the flat array of skeleton samples.

use std::collections::HashMap;

use nalgebra::Point3;

use super::index::Marker;
use crate::error::{Result, TraceError};

/// One skeleton sample.
///
/// Samples are immutable once stored; their marker is the stable identity
/// carried into every trace bit built from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonPoint {
    /// Stable identity of this sample.
    pub marker: Marker,

    /// 3D position.
    pub position: Point3<f64>,

    /// Local structure radius, if known (0.0 otherwise).
    pub radius: f64,

    /// Multiplicative edge cost supplied by the imaging stage (1.0 = neutral).
    pub cost: f64,
}

impl SkeletonPoint {
    /// Create a sample with neutral radius and cost.
    pub fn new(marker: Marker, position: Point3<f64>) -> Self {
        Self {
            marker,
            position,
            radius: 0.0,
            cost: 1.0,
        }
    }

    /// Set the radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the edge cost multiplier.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// Owns the skeleton samples and their marker lookup.
#[derive(Debug, Clone, Default)]
pub struct GeometryStore {
    points: Vec<SkeletonPoint>,
    lookup: HashMap<Marker, usize>,
    next_marker: usize,
}

impl GeometryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from bare positions; markers are assigned `0..n`.
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        let mut store = Self::new();
        for &p in positions {
            store.push(p);
        }
        store
    }

    /// Append a position with the next free marker and return that marker.
    pub fn push(&mut self, position: Point3<f64>) -> Marker {
        let marker = self.next_marker();
        self.insert_unchecked(SkeletonPoint::new(marker, position));
        marker
    }

    /// Append a fully specified sample.
    pub fn insert(&mut self, point: SkeletonPoint) -> Result<()> {
        if self.lookup.contains_key(&point.marker) {
            return Err(TraceError::DuplicateMarker {
                marker: point.marker,
            });
        }
        self.insert_unchecked(point);
        Ok(())
    }

    fn insert_unchecked(&mut self, point: SkeletonPoint) {
        self.lookup.insert(point.marker, self.points.len());
        self.next_marker = self.next_marker.max(point.marker.index() + 1);
        self.points.push(point);
    }

    /// The smallest marker greater than every stored marker.
    #[inline]
    pub fn next_marker(&self) -> Marker {
        Marker::new(self.next_marker)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All samples in insertion order.
    #[inline]
    pub fn points(&self) -> &[SkeletonPoint] {
        &self.points
    }

    /// Look up a sample by marker.
    pub fn get(&self, marker: Marker) -> Option<&SkeletonPoint> {
        self.lookup.get(&marker).map(|&i| &self.points[i])
    }

    /// Look up a sample position by marker.
    pub fn position(&self, marker: Marker) -> Option<Point3<f64>> {
        self.get(marker).map(|p| p.position)
    }

    /// Iterate over all samples.
    pub fn iter(&self) -> impl Iterator<Item = &SkeletonPoint> + '_ {
        self.points.iter()
    }

    /// Axis-aligned bounding box of all samples.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.points.first()?.position;
        let (min, max) = self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(&p.position), hi.sup(&p.position))
        });
        Some((min, max))
    }

    /// Return a copy without non-finite samples and without duplicates.
    ///
    /// A non-finite or negative cost is reset to the neutral 1.0.
    ///
    /// Two samples are duplicates when they fall in the same cell of a grid
    /// with spacing `epsilon`; the first one in insertion order is kept, so
    /// markers of surviving samples are unchanged.
    pub fn deduplicated(&self, epsilon: f64) -> GeometryStore {
        let epsilon = if epsilon > 0.0 { epsilon } else { f64::EPSILON };
        let mut seen: HashMap<[i64; 3], Marker> = HashMap::with_capacity(self.points.len());
        let mut out = GeometryStore::new();
        let mut dropped = 0usize;

        for p in &self.points {
            let pos = p.position;
            if !(pos.x.is_finite() && pos.y.is_finite() && pos.z.is_finite()) {
                log::warn!("dropping non-finite skeleton point {:?}", p.marker);
                continue;
            }
            let key = [
                (pos.x / epsilon).round() as i64,
                (pos.y / epsilon).round() as i64,
                (pos.z / epsilon).round() as i64,
            ];
            if seen.contains_key(&key) {
                dropped += 1;
                continue;
            }
            seen.insert(key, p.marker);
            let mut point = *p;
            if !(point.cost.is_finite() && point.cost >= 0.0) {
                log::warn!(
                    "resetting cost {} of skeleton point {:?} to 1",
                    point.cost,
                    point.marker
                );
                point.cost = 1.0;
            }
            out.insert_unchecked(point);
        }

        if dropped > 0 {
            log::debug!("removed {} duplicate skeleton points", dropped);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_sequential_markers() {
        let mut store = GeometryStore::new();
        let a = store.push(Point3::new(0.0, 0.0, 0.0));
        let b = store.push(Point3::new(1.0, 0.0, 0.0));
        assert_eq!(a, Marker::new(0));
        assert_eq!(b, Marker::new(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.position(b), Some(Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_insert_rejects_duplicate_marker() {
        let mut store = GeometryStore::new();
        store
            .insert(SkeletonPoint::new(Marker::new(4), Point3::origin()))
            .unwrap();
        let err = store
            .insert(SkeletonPoint::new(Marker::new(4), Point3::new(1.0, 1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, TraceError::DuplicateMarker { .. }));
        assert_eq!(store.next_marker(), Marker::new(5));
    }

    #[test]
    fn test_dedup_keeps_first_marker() {
        let store = GeometryStore::from_positions(&[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(f64::NAN, 0.0, 0.0),
        ]);
        let clean = store.deduplicated(1e-6);
        assert_eq!(clean.len(), 2);
        assert!(clean.get(Marker::new(0)).is_some());
        assert!(clean.get(Marker::new(2)).is_none());
        assert!(clean.get(Marker::new(3)).is_none());
    }

    #[test]
    fn test_dedup_resets_bad_costs() {
        let mut store = GeometryStore::new();
        for (i, cost) in [f64::NAN, f64::INFINITY, -2.0, 0.5].into_iter().enumerate() {
            store
                .insert(SkeletonPoint::new(Marker::new(i), Point3::new(i as f64, 0.0, 0.0)).with_cost(cost))
                .unwrap();
        }
        let clean = store.deduplicated(1e-6);
        let costs: Vec<f64> = clean.iter().map(|p| p.cost).collect();
        assert_eq!(costs, vec![1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_next_marker_tracks_inserts() {
        let mut store = GeometryStore::from_positions(&[Point3::origin(); 3]);
        assert_eq!(store.next_marker(), Marker::new(3));
        store
            .insert(SkeletonPoint::new(Marker::new(10), Point3::origin()))
            .unwrap();
        assert_eq!(store.push(Point3::origin()), Marker::new(11));
        store
            .insert(SkeletonPoint::new(Marker::new(4), Point3::origin()))
            .unwrap();
        assert_eq!(store.next_marker(), Marker::new(12));

        let clean = store.deduplicated(1e-6);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean.next_marker(), Marker::new(1));
    }

    #[test]
    fn test_bounding_box() {
        let store = GeometryStore::from_positions(&[
            Point3::new(0.0, 5.0, -1.0),
            Point3::new(2.0, -3.0, 4.0),
        ]);
        let (min, max) = store.bounding_box().unwrap();
        assert_eq!(min, Point3::new(0.0, -3.0, -1.0));
        assert_eq!(max, Point3::new(2.0, 5.0, 4.0));
        assert!(GeometryStore::new().bounding_box().is_none());
    }
}
