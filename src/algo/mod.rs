//! Tracing algorithms.
//!
//! - **Skeleton**: proximity graph, minimum spanning forest, spur pruning and
//!   backbone extraction, turning skeleton points into a trace forest
//! - **Gaps**: scoring and conflict resolution for reconnecting free
//!   trace-line endpoints
//!
//! Long-running entry points have `_with_progress` variants that report
//! stage progress and can be cancelled through [`Progress`].

pub mod gaps;
pub mod progress;
pub mod skeleton;

pub use progress::{CancelToken, Progress};
