//! The editing session: one live forest, its history and its settings.
//!
//! Every edit method runs against the live forest and, on success, commits
//! a snapshot under a label. If an edit fails part way through a batch, the
//! live forest is reset to the last committed snapshot, so a batch is
//! applied completely or not at all.
//!
//! ```
//! use filament::geometry::Marker;
//! use filament::session::EditSession;
//! use filament::trace::{Forest, TraceBit};
//! use filament::TraceConfig;
//! use nalgebra::Point3;
//!
//! let bits = (0..6)
//!     .map(|i| TraceBit::new(Marker::new(i), Point3::new(i as f64, 0.0, 0.0), 1.0))
//!     .collect();
//! let mut forest = Forest::new();
//! forest.add_root(bits).unwrap();
//!
//! let mut session = EditSession::new(forest, TraceConfig::default());
//! session.split(Marker::new(2)).unwrap();
//! assert_eq!(session.forest().num_lines(), 2);
//!
//! assert_eq!(session.undo(), Some("load"));
//! assert_eq!(session.forest().num_lines(), 1);
//! ```

use crate::algo::gaps::{compute_gaps, Gap, GapReport};
use crate::algo::skeleton::build_forest;
use crate::config::TraceConfig;
use crate::error::{Result, TraceError};
use crate::geometry::{GeometryStore, LineId, Marker};
use crate::history::UndoBuffer;
use crate::trace::{Forest, TraceLine};

/// Outcome of merging a batch of gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSummary {
    /// Gaps merged.
    pub merged: usize,
    /// Gaps that no longer applied and were skipped.
    pub skipped: usize,
    /// Sum of the merged gaps' costs.
    pub total_cost: f64,
}

impl MergeSummary {
    /// Mean cost of the merged gaps (0 if none).
    pub fn average_cost(&self) -> f64 {
        if self.merged == 0 {
            0.0
        } else {
            self.total_cost / self.merged as f64
        }
    }
}

/// A forest under edit, with undo/redo.
#[derive(Debug, Clone)]
pub struct EditSession {
    forest: Forest,
    history: UndoBuffer<Forest>,
    config: TraceConfig,
}

impl EditSession {
    /// Start a session on an existing forest; the initial state is committed
    /// as `"load"`.
    pub fn new(forest: Forest, config: TraceConfig) -> Self {
        let mut history = UndoBuffer::new(config.history_capacity);
        history.commit("load", forest.clone());
        Self {
            forest,
            history,
            config,
        }
    }

    /// Build a forest from skeleton points and start a session on it.
    pub fn from_store(store: &GeometryStore, config: TraceConfig) -> Result<Self> {
        config.validate()?;
        let forest = build_forest(store, &config.skeleton)?;
        Ok(Self::new(forest, config))
    }

    /// The live forest.
    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Session settings.
    #[inline]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// The undo history.
    #[inline]
    pub fn history(&self) -> &UndoBuffer<Forest> {
        &self.history
    }

    /// Consume the session and return the live forest.
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Run `edit` on the live forest and commit on success.
    ///
    /// On failure the live forest is reset to the last committed snapshot.
    pub fn apply<T, F>(&mut self, label: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Forest) -> Result<T>,
    {
        match edit(&mut self.forest) {
            Ok(value) => {
                self.history.commit(label, self.forest.clone());
                log::info!("{}", label);
                Ok(value)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn rollback(&mut self) {
        if let Some(entry) = self.history.current() {
            self.forest = entry.state.clone();
        }
    }

    // ==================== Edits ====================

    /// Split the line holding `marker`. See [`Forest::split`].
    pub fn split(&mut self, marker: Marker) -> Result<(LineId, LineId)> {
        self.apply(&format!("split at {}", marker), |f| f.split(marker))
    }

    /// Split at several markers as one edit.
    pub fn split_many(&mut self, markers: &[Marker]) -> Result<Vec<(LineId, LineId)>> {
        self.apply(&format!("split {} lines", markers.len()), |f| {
            markers.iter().map(|&m| f.split(m)).collect()
        })
    }

    /// Merge two lines at their boundary markers. See [`Forest::merge`].
    pub fn merge(&mut self, a: Marker, b: Marker) -> Result<LineId> {
        self.apply(&format!("merge {} and {}", a, b), |f| f.merge(a, b))
    }

    /// Delete a line. See [`Forest::delete`].
    pub fn delete(&mut self, id: LineId) -> Result<TraceLine> {
        self.apply(&format!("delete line {}", id), |f| f.delete(id))
    }

    /// Delete several lines as one edit.
    ///
    /// Lines already absorbed by the degree-2 collapse of an earlier
    /// deletion in the same batch are skipped.
    pub fn delete_lines(&mut self, ids: &[LineId]) -> Result<usize> {
        let missing: Vec<LineId> = ids
            .iter()
            .copied()
            .filter(|&id| self.forest.line(id).is_none())
            .collect();
        if let Some(&line) = missing.first() {
            return Err(TraceError::LineNotFound { line });
        }
        self.apply(&format!("delete {} lines", ids.len()), |f| {
            let mut deleted = 0;
            for &id in ids {
                if f.line(id).is_some() {
                    f.delete(id)?;
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    /// Attach `child` below `trunk`. See [`Forest::add_branch`].
    pub fn add_branch(&mut self, trunk: LineId, child: LineId) -> Result<()> {
        self.apply(&format!("branch {} from {}", child, trunk), |f| {
            f.add_branch(trunk, child)
        })
    }

    /// Attach several children below `trunk` as one edit.
    pub fn add_branches(&mut self, trunk: LineId, children: &[LineId]) -> Result<()> {
        self.apply(
            &format!("branch {} lines from {}", children.len(), trunk),
            |f| children.iter().try_for_each(|&c| f.add_branch(trunk, c)),
        )
    }

    /// Reverse a detached line. See [`Forest::flip`].
    pub fn flip(&mut self, id: LineId) -> Result<()> {
        self.apply(&format!("flip line {}", id), |f| f.flip(id))
    }

    /// Delete every leaf line shorter than the configured small-line length.
    ///
    /// Returns the number of lines deleted; nothing is committed if there
    /// are none.
    pub fn delete_small_lines(&mut self) -> Result<usize> {
        let small = self.forest.find_small_lines(self.config.small_line_length);
        if small.is_empty() {
            return Ok(0);
        }
        self.delete_lines(&small)
    }

    // ==================== Gaps ====================

    /// Score reconnection candidates among `lines` (all lines if empty).
    ///
    /// Does not change the forest or the history.
    pub fn compute_gaps(&self, lines: &[LineId]) -> Result<GapReport> {
        compute_gaps(&self.forest, lines, &self.config.gaps)
    }

    /// Merge the given gaps in order as one edit.
    ///
    /// A gap whose endpoints no longer form a valid merge (because an
    /// earlier merge in the batch used them) is skipped and logged.
    pub fn merge_gaps(&mut self, gaps: &[Gap]) -> Result<MergeSummary> {
        if gaps.is_empty() {
            return Ok(MergeSummary::default());
        }
        self.apply(&format!("merge {} gaps", gaps.len()), |f| {
            let mut summary = MergeSummary::default();
            for gap in gaps {
                match f.merge(gap.end_pt1, gap.end_pt2) {
                    Ok(_) => {
                        summary.merged += 1;
                        summary.total_cost += gap.cost;
                    }
                    Err(e) => {
                        log::warn!(
                            "skipping gap {} - {}: {}",
                            gap.end_pt1,
                            gap.end_pt2,
                            e
                        );
                        summary.skipped += 1;
                    }
                }
            }
            Ok(summary)
        })
    }

    /// Merge the gaps of the selected conflict clusters.
    pub fn merge_components(&mut self, report: &GapReport, comp_ids: &[usize]) -> Result<MergeSummary> {
        let selected: Vec<Gap> = report.in_components(comp_ids).cloned().collect();
        self.merge_gaps(&selected)
    }

    /// Compute gaps among `lines` and merge every one at or below the
    /// configured automatic-merge cost.
    pub fn auto_merge(&mut self, lines: &[LineId]) -> Result<MergeSummary> {
        let report = self.compute_gaps(lines)?;
        let selected: Vec<Gap> = report
            .below_cost(self.config.auto_merge_cost)
            .cloned()
            .collect();
        log::info!(
            "{} of {} gaps at or below cost {}",
            selected.len(),
            report.gaps.len(),
            self.config.auto_merge_cost
        );
        self.merge_gaps(&selected)
    }

    // ==================== History ====================

    /// Restore the previous snapshot; returns the label of the restored
    /// state, or `None` at the oldest snapshot.
    pub fn undo(&mut self) -> Option<&str> {
        let entry = self.history.undo()?;
        self.forest = entry.state.clone();
        Some(entry.label.as_str())
    }

    /// Re-apply the next snapshot; `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<&str> {
        let entry = self.history.redo()?;
        self.forest = entry.state.clone();
        Some(entry.label.as_str())
    }
}
