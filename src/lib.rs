//! # Filament
//!
//! Trace trees for filamentary 3D structures such as neurons and vessels.
//!
//! Filament turns an unordered cloud of skeleton points into a forest of
//! rooted trace-line trees, then lets you edit that forest without ever
//! breaking its structure.
//!
//! ## Features
//!
//! - **Skeleton builder**: proximity graph, minimum spanning forest, spur
//!   pruning and longest-path backbones, deterministic with or without rayon
//! - **Structural edits**: split, merge, delete, branch and flip, each either
//!   fully applied or rejected with the forest untouched
//! - **Gap scoring**: ranked, conflict-free reconnection proposals between
//!   free line endpoints
//! - **Undo/redo**: bounded snapshot history
//! - **File formats**: lossless JSON, SWC, plain-text point lists
//!
//! ## Quick Start
//!
//! ```no_run
//! use filament::prelude::*;
//!
//! let store = filament::io::points::load("skeleton.txt").unwrap();
//! let mut session = EditSession::from_store(&store, TraceConfig::default()).unwrap();
//!
//! let summary = session.auto_merge(&[]).unwrap();
//! println!("merged {} gaps", summary.merged);
//! session.delete_small_lines().unwrap();
//!
//! filament::io::save(session.forest(), "traces.json").unwrap();
//! ```
//!
//! ## Editing a Forest Directly
//!
//! ```
//! use filament::prelude::*;
//! use nalgebra::Point3;
//!
//! let positions: Vec<_> = (0..10).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
//! let store = GeometryStore::from_positions(&positions);
//! let mut forest = build_forest(&store, &SkeletonOptions::default()).unwrap();
//!
//! let (head, tail) = forest.split(Marker::new(4)).unwrap();
//! assert_eq!(forest.line(head).unwrap().num_bits(), 5);
//! forest.flip(tail).unwrap();
//! assert_eq!(forest.line(tail).unwrap().head().unwrap().marker, Marker::new(9));
//! assert!(forest.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod io;
pub mod session;
pub mod trace;

pub use config::TraceConfig;

/// Prelude module for convenient imports.
///
/// ```
/// use filament::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::gaps::{compute_gaps, Gap, GapOptions, GapReport};
    pub use crate::algo::skeleton::{build_forest, SkeletonOptions};
    pub use crate::algo::Progress;
    pub use crate::config::TraceConfig;
    pub use crate::error::{Result, TraceError};
    pub use crate::geometry::{GeometryStore, LineId, Marker, SkeletonPoint};
    pub use crate::history::UndoBuffer;
    pub use crate::session::{EditSession, MergeSummary};
    pub use crate::trace::{End, Forest, ForestSummary, LineFeatures, TraceBit, TraceLine};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
