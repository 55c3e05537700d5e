//! Per-line features and forest summaries.

use super::forest::Forest;
use crate::geometry::LineId;

/// Scalar features of one trace line, as shown in the tree table.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeatures {
    /// Line id.
    pub id: LineId,
    /// Parent line, if any.
    pub parent: Option<LineId>,
    /// Number of bits.
    pub num_bits: usize,
    /// Polyline length.
    pub length: f64,
    /// Mean bit radius.
    pub average_radius: f64,
    /// Number of child lines.
    pub num_children: usize,
    /// Number of ancestors.
    pub depth: usize,
}

/// Totals over a whole forest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestSummary {
    /// Number of root lines (independent trees).
    pub num_roots: usize,
    /// Number of trace lines.
    pub num_lines: usize,
    /// Number of trace bits.
    pub num_bits: usize,
    /// Lines without children.
    pub num_leaves: usize,
    /// Lines with at least two children.
    pub num_branch_points: usize,
    /// Sum of all line lengths.
    pub total_length: f64,
    /// Deepest line depth.
    pub max_depth: usize,
}

impl Forest {
    /// Features of every line, in pre-order.
    pub fn line_features(&self) -> Vec<LineFeatures> {
        let mut depths = std::collections::HashMap::with_capacity(self.num_lines());
        let mut out = Vec::with_capacity(self.num_lines());
        for id in self.pre_order() {
            let Some(line) = self.line(id) else { continue };
            let depth = line
                .parent()
                .and_then(|p| depths.get(&p).map(|d| d + 1))
                .unwrap_or(0);
            depths.insert(id, depth);
            out.push(LineFeatures {
                id,
                parent: line.parent(),
                num_bits: line.num_bits(),
                length: line.length(),
                average_radius: line.average_radius(),
                num_children: line.children().len(),
                depth,
            });
        }
        out
    }

    /// Totals over the whole forest.
    pub fn summary(&self) -> ForestSummary {
        let features = self.line_features();
        ForestSummary {
            num_roots: self.roots().len(),
            num_lines: self.num_lines(),
            num_bits: self.num_bits(),
            num_leaves: features.iter().filter(|f| f.num_children == 0).count(),
            num_branch_points: features.iter().filter(|f| f.num_children >= 2).count(),
            total_length: features.iter().map(|f| f.length).sum(),
            max_depth: features.iter().map(|f| f.depth).max().unwrap_or(0),
        }
    }
}
