//! Error types for filament.
//!
//! Structural edits validate every precondition before touching the forest,
//! so any error returned by an edit leaves the forest exactly as it was.

use thiserror::Error;

use crate::geometry::{LineId, Marker};

/// Result type alias using [`TraceError`].
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that can occur while building or editing a trace forest.
#[derive(Error, Debug)]
pub enum TraceError {
    /// No trace bit carries the requested marker.
    #[error("marker {marker} not found in the forest")]
    MarkerNotFound {
        /// The missing marker.
        marker: Marker,
    },

    /// No trace line has the requested id.
    #[error("trace line {line} not found in the forest")]
    LineNotFound {
        /// The missing line id.
        line: LineId,
    },

    /// A split or merge was requested at a bit that is not a usable boundary.
    #[error("marker {marker} is not a valid boundary: {reason}")]
    InvalidBoundary {
        /// The offending marker.
        marker: Marker,
        /// Why the marker cannot be used.
        reason: &'static str,
    },

    /// The two merge endpoints are not both free line ends.
    #[error("markers {first} and {second} are not both free line endpoints")]
    NotAdjacent {
        /// First endpoint marker.
        first: Marker,
        /// Second endpoint marker.
        second: Marker,
    },

    /// The edit would make a line its own ancestor.
    #[error("connecting line {line} below line {ancestor} would create a cycle")]
    Cycle {
        /// The line that would end up above itself.
        ancestor: LineId,
        /// The line being connected.
        line: LineId,
    },

    /// A line that already has a parent cannot be attached again.
    #[error("trace line {line} already has a parent")]
    AlreadyAttached {
        /// The attached line.
        line: LineId,
    },

    /// A line with a parent or children cannot have its direction reversed.
    #[error("trace line {line} is connected to other lines and cannot be reversed")]
    Connected {
        /// The connected line.
        line: LineId,
    },

    /// The skeleton builder received no usable points.
    ///
    /// The builder itself treats this as an empty forest rather than a failure.
    #[error("no skeleton points to build from")]
    EmptyInput,

    /// The same marker was found on more than one trace bit.
    #[error("marker {marker} appears more than once")]
    DuplicateMarker {
        /// The repeated marker.
        marker: Marker,
    },

    /// A long-running computation was cancelled.
    #[error("operation aborted: {reason}")]
    Aborted {
        /// What caused the abort.
        reason: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed text input.
    #[error("parse error on line {line_number}: {message}")]
    Parse {
        /// 1-based line number in the input.
        line_number: usize,
        /// Description of the problem.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// The forest violates one of its structural invariants.
    #[error("invalid forest state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl TraceError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        TraceError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an abort error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        TraceError::Aborted {
            reason: reason.into(),
        }
    }
}
