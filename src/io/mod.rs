//! Trace forest and skeleton point I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Contents | Notes |
//! |--------|-----------|----------|-------|
//! | JSON | `.json` | forest | Lossless: ids, order and markers round-trip |
//! | SWC | `.swc` | forest | Sample table; lines with a single child are joined on load |
//! | Points | `.txt`, `.xyz`, `.pts` | skeleton points | `x y z [radius [cost]]` per line |
//!
//! # Usage
//!
//! ```no_run
//! use filament::io::{load, save};
//!
//! let forest = load("traces.json").unwrap();
//! save(&forest, "traces.swc").unwrap();
//!
//! let store = filament::io::points::load("skeleton.txt").unwrap();
//! ```

pub mod json;
pub mod points;
pub mod swc;

use std::path::Path;

use crate::error::{Result, TraceError};
use crate::trace::Forest;

/// Supported forest file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Pre-order line records as JSON.
    Json,
    /// SWC sample table.
    Swc,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "swc" => Some(Format::Swc),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn unsupported(path: &Path) -> TraceError {
    TraceError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    }
}

/// Load a forest, choosing the format by file extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Forest> {
    let path = path.as_ref();
    match Format::from_path(path).ok_or_else(|| unsupported(path))? {
        Format::Json => json::load(path),
        Format::Swc => swc::load(path),
    }
}

/// Save a forest, choosing the format by file extension.
pub fn save<P: AsRef<Path>>(forest: &Forest, path: P) -> Result<()> {
    let path = path.as_ref();
    match Format::from_path(path).ok_or_else(|| unsupported(path))? {
        Format::Json => json::save(forest, path),
        Format::Swc => swc::save(forest, path),
    }
}
