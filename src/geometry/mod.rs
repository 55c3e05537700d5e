//! Geometry storage and identifiers.
//!
//! The [`GeometryStore`] holds the skeleton samples produced by the (external)
//! skeletonization stage. Every sample carries a [`Marker`], the stable id that
//! follows the sample into the trace forest as a trace bit.
//!
//! ```
//! use filament::geometry::{GeometryStore, Marker};
//! use nalgebra::Point3;
//!
//! let mut store = GeometryStore::new();
//! let m = store.push(Point3::new(1.0, 2.0, 3.0));
//! assert_eq!(m, Marker::new(0));
//! assert_eq!(store.position(m), Some(Point3::new(1.0, 2.0, 3.0)));
//! ```

mod index;
mod store;

pub use index::{LineId, Marker};
pub use store::{GeometryStore, SkeletonPoint};
