//! The trace tree model.
//!
//! A [`Forest`] is a set of rooted trees of [`TraceLine`]s. Each line is an
//! ordered run of [`TraceBit`]s; its head connects to the parent's tail and
//! its children all attach at its tail.
//!
//! # Invariants
//!
//! After every successful edit:
//! - no line is its own ancestor
//! - every non-root line has exactly one parent
//! - every bit marker is unique across the whole forest
//!
//! Edits that would break an invariant are rejected before any mutation.
//!
//! # Example
//!
//! ```
//! use filament::geometry::Marker;
//! use filament::trace::{Forest, TraceBit};
//! use nalgebra::Point3;
//!
//! let bits = (0..5)
//!     .map(|i| TraceBit::new(Marker::new(i), Point3::new(i as f64, 0.0, 0.0), 1.0))
//!     .collect();
//! let mut forest = Forest::new();
//! let line = forest.add_root(bits).unwrap();
//!
//! let (head, tail) = forest.split(Marker::new(2)).unwrap();
//! assert_eq!(forest.num_lines(), 2);
//!
//! let merged = forest.merge(Marker::new(2), Marker::new(3)).unwrap();
//! assert_eq!(merged, head);
//! assert_eq!(forest.line(merged).unwrap().num_bits(), 5);
//! # let _ = (line, tail);
//! ```

mod edit;
mod forest;
mod line;
mod stats;

pub use forest::Forest;
pub use line::{End, TraceBit, TraceLine};
pub use stats::{ForestSummary, LineFeatures};
