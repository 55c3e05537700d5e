//! Trace bits and trace lines.

use nalgebra::{Point3, Unit, Vector3};

use crate::geometry::{LineId, Marker, SkeletonPoint};

/// Number of bits looked back from an end when estimating its direction.
const DIRECTION_WINDOW: usize = 3;

/// One sample along a trace line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceBit {
    /// Stable id of the geometry sample this bit came from.
    pub marker: Marker,

    /// 3D position.
    pub position: Point3<f64>,

    /// Local radius (0.0 when unknown).
    pub radius: f64,
}

impl TraceBit {
    /// Create a new trace bit.
    pub fn new(marker: Marker, position: Point3<f64>, radius: f64) -> Self {
        Self {
            marker,
            position,
            radius,
        }
    }
}

impl From<&SkeletonPoint> for TraceBit {
    fn from(p: &SkeletonPoint) -> Self {
        Self::new(p.marker, p.position, p.radius)
    }
}

/// Which end of a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum End {
    /// The first bit; connects to the parent.
    Head,
    /// The last bit; children attach here.
    Tail,
}

impl End {
    /// The other end.
    #[inline]
    pub fn opposite(self) -> End {
        match self {
            End::Head => End::Tail,
            End::Tail => End::Head,
        }
    }
}

/// A node of the trace forest: an ordered run of bits.
///
/// The head bit connects to the parent line's tail; children attach only at
/// the tail. Length and average radius are cached and refreshed whenever the
/// bit sequence changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLine {
    pub(crate) id: LineId,
    pub(crate) bits: Vec<TraceBit>,
    pub(crate) parent: Option<LineId>,
    pub(crate) children: Vec<LineId>,
    length: f64,
    average_radius: f64,
}

impl TraceLine {
    pub(crate) fn new(id: LineId, bits: Vec<TraceBit>) -> Self {
        let mut line = Self {
            id,
            bits,
            parent: None,
            children: Vec::new(),
            length: 0.0,
            average_radius: 0.0,
        };
        line.refresh_features();
        line
    }

    /// The line id.
    #[inline]
    pub fn id(&self) -> LineId {
        self.id
    }

    /// The ordered bits.
    #[inline]
    pub fn bits(&self) -> &[TraceBit] {
        &self.bits
    }

    /// Number of bits.
    #[inline]
    pub fn num_bits(&self) -> usize {
        self.bits.len()
    }

    /// The parent line, `None` for a root.
    #[inline]
    pub fn parent(&self) -> Option<LineId> {
        self.parent
    }

    /// Child lines in attachment order.
    #[inline]
    pub fn children(&self) -> &[LineId] {
        &self.children
    }

    /// Check if this line has no parent.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Check if this line has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The first bit.
    #[inline]
    pub fn head(&self) -> Option<&TraceBit> {
        self.bits.first()
    }

    /// The last bit.
    #[inline]
    pub fn tail(&self) -> Option<&TraceBit> {
        self.bits.last()
    }

    /// The bit at the given end.
    pub fn end_bit(&self, end: End) -> Option<&TraceBit> {
        match end {
            End::Head => self.head(),
            End::Tail => self.tail(),
        }
    }

    /// Polyline length (sum of segment lengths).
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Mean bit radius.
    #[inline]
    pub fn average_radius(&self) -> f64 {
        self.average_radius
    }

    /// Iterate over the markers of this line, head to tail.
    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.bits.iter().map(|b| b.marker)
    }

    /// Position of `marker` within the bit sequence.
    pub fn position_of(&self, marker: Marker) -> Option<usize> {
        self.bits.iter().position(|b| b.marker == marker)
    }

    /// Which end `marker` sits on, if it is an endpoint.
    ///
    /// A single-bit line reports [`End::Head`].
    pub fn end_of(&self, marker: Marker) -> Option<End> {
        if self.head().map(|b| b.marker) == Some(marker) {
            Some(End::Head)
        } else if self.tail().map(|b| b.marker) == Some(marker) {
            Some(End::Tail)
        } else {
            None
        }
    }

    /// Whether nothing is connected at the given end.
    pub fn is_free(&self, end: End) -> bool {
        match end {
            End::Head => self.parent.is_none(),
            End::Tail => self.children.is_empty(),
        }
    }

    /// Outward unit direction at an end, estimated over a few bits.
    ///
    /// Returns `None` for single-bit lines or when the end bits coincide.
    pub fn end_direction(&self, end: End) -> Option<Unit<Vector3<f64>>> {
        let n = self.bits.len();
        if n < 2 {
            return None;
        }
        let back = DIRECTION_WINDOW.min(n - 1);
        let (tip, inner) = match end {
            End::Head => (self.bits[0].position, self.bits[back].position),
            End::Tail => (self.bits[n - 1].position, self.bits[n - 1 - back].position),
        };
        Unit::try_new(tip - inner, 1e-12)
    }

    /// Reverse the bit order in place.
    ///
    /// This only touches the bit sequence; callers are responsible for the
    /// line being detached so that head/tail connectivity stays valid.
    pub(crate) fn reverse_segment(&mut self) {
        self.bits.reverse();
    }

    pub(crate) fn refresh_features(&mut self) {
        self.length = self
            .bits
            .windows(2)
            .map(|w| (w[1].position - w[0].position).norm())
            .sum();
        self.average_radius = if self.bits.is_empty() {
            0.0
        } else {
            self.bits.iter().map(|b| b.radius).sum::<f64>() / self.bits.len() as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line(n: usize) -> TraceLine {
        let bits = (0..n)
            .map(|i| TraceBit::new(Marker::new(i), Point3::new(i as f64, 0.0, 0.0), 1.0 + i as f64))
            .collect();
        TraceLine::new(LineId::new(0), bits)
    }

    #[test]
    fn test_features() {
        let line = straight_line(5);
        assert!((line.length() - 4.0).abs() < 1e-12);
        assert!((line.average_radius() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_end_of() {
        let line = straight_line(4);
        assert_eq!(line.end_of(Marker::new(0)), Some(End::Head));
        assert_eq!(line.end_of(Marker::new(3)), Some(End::Tail));
        assert_eq!(line.end_of(Marker::new(1)), None);
        assert_eq!(line.position_of(Marker::new(2)), Some(2));
    }

    #[test]
    fn test_end_direction_points_outward() {
        let line = straight_line(6);
        let head = line.end_direction(End::Head).unwrap();
        let tail = line.end_direction(End::Tail).unwrap();
        assert!((head.x + 1.0).abs() < 1e-12);
        assert!((tail.x - 1.0).abs() < 1e-12);
        assert!(straight_line(1).end_direction(End::Head).is_none());
    }

    #[test]
    fn test_reverse_keeps_features() {
        let mut line = straight_line(4);
        let length = line.length();
        line.reverse_segment();
        line.refresh_features();
        assert_eq!(line.head().unwrap().marker, Marker::new(3));
        assert!((line.length() - length).abs() < 1e-12);
    }
}
