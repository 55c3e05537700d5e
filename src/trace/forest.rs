//! The trace forest: an arena of trace lines plus the marker lookup.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::line::{End, TraceBit, TraceLine};
use crate::error::{Result, TraceError};
use crate::geometry::{LineId, Marker};

/// A forest of rooted trace-line trees.
///
/// Lines are owned by the forest and addressed by [`LineId`]. Each line owns
/// its ordered child list; the parent link is a plain id used for lookups and
/// ancestry checks. The marker index maps every bit marker to the line that
/// holds it and is updated together with every structural edit.
///
/// Cloning a forest yields a fully independent copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub(crate) lines: BTreeMap<LineId, TraceLine>,
    pub(crate) roots: Vec<LineId>,
    pub(crate) markers: HashMap<Marker, LineId>,
    pub(crate) next_id: u32,
}

impl Forest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    /// Number of trace lines.
    #[inline]
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Number of trace bits across all lines.
    #[inline]
    pub fn num_bits(&self) -> usize {
        self.markers.len()
    }

    /// Check if the forest has no lines.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Root lines in order.
    #[inline]
    pub fn roots(&self) -> &[LineId] {
        &self.roots
    }

    /// Get a line by id.
    #[inline]
    pub fn line(&self, id: LineId) -> Option<&TraceLine> {
        self.lines.get(&id)
    }

    /// Get a line by id, or a [`TraceError::LineNotFound`].
    pub fn try_line(&self, id: LineId) -> Result<&TraceLine> {
        self.lines
            .get(&id)
            .ok_or(TraceError::LineNotFound { line: id })
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Result<&mut TraceLine> {
        self.lines
            .get_mut(&id)
            .ok_or(TraceError::LineNotFound { line: id })
    }

    /// Iterate over all lines in id order.
    pub fn lines(&self) -> impl Iterator<Item = &TraceLine> + '_ {
        self.lines.values()
    }

    /// All line ids in id order.
    pub fn line_ids(&self) -> Vec<LineId> {
        self.lines.keys().copied().collect()
    }

    /// The line holding `marker`.
    #[inline]
    pub fn line_of(&self, marker: Marker) -> Option<LineId> {
        self.markers.get(&marker).copied()
    }

    /// The line holding `marker` and the bit's position in it.
    pub fn locate(&self, marker: Marker) -> Result<(LineId, usize)> {
        let id = self
            .line_of(marker)
            .ok_or(TraceError::MarkerNotFound { marker })?;
        let pos = self
            .lines
            .get(&id)
            .and_then(|line| line.position_of(marker))
            .ok_or(TraceError::MarkerNotFound { marker })?;
        Ok((id, pos))
    }

    /// The bit carrying `marker`.
    pub fn bit(&self, marker: Marker) -> Option<&TraceBit> {
        let (id, pos) = self.locate(marker).ok()?;
        self.lines.get(&id).map(|line| &line.bits[pos])
    }

    /// Line ids in pre-order: each root followed by its subtree, children in
    /// attachment order.
    pub fn pre_order(&self) -> Vec<LineId> {
        let mut order = Vec::with_capacity(self.lines.len());
        let mut stack: Vec<LineId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(line) = self.lines.get(&id) {
                stack.extend(line.children.iter().rev().copied());
            }
        }
        order
    }

    /// `id` and all of its descendants, in pre-order.
    pub fn subtree(&self, id: LineId) -> Vec<LineId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(line) = self.lines.get(&cur) {
                out.push(cur);
                stack.extend(line.children.iter().rev().copied());
            }
        }
        out
    }

    /// Whether `ancestor` lies on the parent chain of `id` (or equals it).
    pub fn is_ancestor(&self, ancestor: LineId, id: LineId) -> bool {
        let mut cur = Some(id);
        // The bound keeps a corrupted parent chain from looping forever.
        for _ in 0..=self.lines.len() {
            match cur {
                Some(c) if c == ancestor => return true,
                Some(c) => cur = self.lines.get(&c).and_then(|l| l.parent),
                None => return false,
            }
        }
        false
    }

    /// Number of ancestors of `id` (0 for a root).
    pub fn depth(&self, id: LineId) -> usize {
        let mut depth = 0;
        let mut cur = self.lines.get(&id).and_then(|l| l.parent);
        while let Some(p) = cur {
            depth += 1;
            if depth > self.lines.len() {
                break;
            }
            cur = self.lines.get(&p).and_then(|l| l.parent);
        }
        depth
    }

    /// Leaf lines shorter than `threshold`.
    ///
    /// These are the small dangling pieces the editor offers to delete in
    /// one batch.
    pub fn find_small_lines(&self, threshold: f64) -> Vec<LineId> {
        self.lines
            .values()
            .filter(|l| l.is_leaf() && l.length() < threshold)
            .map(|l| l.id)
            .collect()
    }

    /// Whether `child` is already oriented to hang below `trunk`.
    ///
    /// Returns `true` if the child's head is at least as close to the trunk's
    /// tail as the child's tail is; `false` means a reversal is needed.
    pub fn orient(&self, child: LineId, trunk: LineId) -> Result<bool> {
        let trunk_line = self.try_line(trunk)?;
        let child_line = self.try_line(child)?;
        let (Some(t), Some(h), Some(c)) = (trunk_line.tail(), child_line.head(), child_line.tail())
        else {
            return Ok(true);
        };
        let to_head = (h.position - t.position).norm_squared();
        let to_tail = (c.position - t.position).norm_squared();
        Ok(to_head <= to_tail)
    }

    // ==================== Construction ====================

    /// Add a new root line.
    pub fn add_root(&mut self, bits: Vec<TraceBit>) -> Result<LineId> {
        self.check_new_bits(&bits)?;
        let id = self.alloc_id();
        self.insert_line(TraceLine::new(id, bits));
        self.roots.push(id);
        Ok(id)
    }

    /// Add a new line attached below `parent`.
    pub fn add_child(&mut self, parent: LineId, bits: Vec<TraceBit>) -> Result<LineId> {
        self.try_line(parent)?;
        self.check_new_bits(&bits)?;
        let id = self.alloc_id();
        let mut line = TraceLine::new(id, bits);
        line.parent = Some(parent);
        self.insert_line(line);
        self.line_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Re-insert a line under a known id, as when reloading a saved forest.
    pub(crate) fn restore_line(
        &mut self,
        id: LineId,
        parent: Option<LineId>,
        bits: Vec<TraceBit>,
    ) -> Result<()> {
        if self.lines.contains_key(&id) {
            return Err(TraceError::InvalidState(format!("line id {} used twice", id)));
        }
        self.check_new_bits(&bits)?;
        let mut line = TraceLine::new(id, bits);
        line.parent = parent;
        match parent {
            Some(p) => self.line_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        self.insert_line(line);
        self.next_id = self.next_id.max(id.raw() + 1);
        Ok(())
    }

    pub(crate) fn set_next_id(&mut self, next_id: u32) {
        self.next_id = self.next_id.max(next_id);
    }

    fn check_new_bits(&self, bits: &[TraceBit]) -> Result<()> {
        if bits.is_empty() {
            return Err(TraceError::invalid_param(
                "bits",
                0,
                "a trace line needs at least one bit",
            ));
        }
        let mut seen = HashSet::with_capacity(bits.len());
        for b in bits {
            if self.markers.contains_key(&b.marker) || !seen.insert(b.marker) {
                return Err(TraceError::DuplicateMarker { marker: b.marker });
            }
        }
        Ok(())
    }

    // ==================== Internal surgery helpers ====================

    pub(crate) fn alloc_id(&mut self) -> LineId {
        let id = LineId::from(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a line and index its markers.
    pub(crate) fn insert_line(&mut self, line: TraceLine) {
        for m in line.markers() {
            self.markers.insert(m, line.id);
        }
        self.lines.insert(line.id, line);
    }

    /// Remove a line from the arena and unindex its markers.
    ///
    /// Parent, child and root links are left for the caller to fix.
    pub(crate) fn take_line(&mut self, id: LineId) -> Result<TraceLine> {
        let line = self
            .lines
            .remove(&id)
            .ok_or(TraceError::LineNotFound { line: id })?;
        for m in line.markers() {
            self.markers.remove(&m);
        }
        Ok(line)
    }

    /// Put `new` where `old` sits: in its parent's child list, or in the roots.
    pub(crate) fn replace_slot(&mut self, old: LineId, parent: Option<LineId>, new: LineId) {
        let slots = match parent {
            Some(p) => match self.lines.get_mut(&p) {
                Some(line) => &mut line.children,
                None => return,
            },
            None => &mut self.roots,
        };
        if let Some(slot) = slots.iter_mut().find(|s| **s == old) {
            *slot = new;
        }
    }

    pub(crate) fn set_parent(&mut self, children: &[LineId], parent: Option<LineId>) {
        for c in children {
            if let Some(line) = self.lines.get_mut(c) {
                line.parent = parent;
            }
        }
    }

    /// Append `second`'s bits (optionally reversed) to `first` and hand
    /// `second`'s children to `first`.
    ///
    /// `second` must already be unlinked from the arena.
    pub(crate) fn absorb(&mut self, first: LineId, second: TraceLine, reversed: bool) -> Result<()> {
        let mut bits = second.bits;
        if reversed {
            bits.reverse();
        }
        for b in &bits {
            self.markers.insert(b.marker, first);
        }
        let children = second.children;
        let line = self.line_mut(first)?;
        line.bits.extend(bits);
        line.children = children.clone();
        line.refresh_features();
        self.set_parent(&children, Some(first));
        Ok(())
    }

    // ==================== Validation ====================

    /// Check every structural invariant.
    ///
    /// - every line is reachable from exactly one root, exactly once (acyclic)
    /// - parent links agree with child lists
    /// - every line has at least one bit
    /// - every marker is unique and indexed to the line holding it
    pub fn validate(&self) -> Result<()> {
        let mut visited: HashSet<LineId> = HashSet::with_capacity(self.lines.len());
        let mut stack: Vec<(LineId, Option<LineId>)> =
            self.roots.iter().map(|&r| (r, None)).collect();

        while let Some((id, expected_parent)) = stack.pop() {
            let line = self.lines.get(&id).ok_or_else(|| {
                TraceError::InvalidState(format!("dangling reference to line {}", id))
            })?;
            if !visited.insert(id) {
                return Err(TraceError::InvalidState(format!(
                    "line {} reachable more than once",
                    id
                )));
            }
            if line.parent != expected_parent {
                return Err(TraceError::InvalidState(format!(
                    "line {} has parent {:?}, expected {:?}",
                    id, line.parent, expected_parent
                )));
            }
            if line.bits.is_empty() {
                return Err(TraceError::InvalidState(format!("line {} has no bits", id)));
            }
            stack.extend(line.children.iter().map(|&c| (c, Some(id))));
        }

        if visited.len() != self.lines.len() {
            return Err(TraceError::InvalidState(format!(
                "{} lines unreachable from any root",
                self.lines.len() - visited.len()
            )));
        }

        let mut total_bits = 0;
        for line in self.lines.values() {
            for m in line.markers() {
                total_bits += 1;
                if self.markers.get(&m) != Some(&line.id) {
                    return Err(TraceError::DuplicateMarker { marker: m });
                }
            }
        }
        if total_bits != self.markers.len() {
            return Err(TraceError::InvalidState(format!(
                "marker index holds {} entries for {} bits",
                self.markers.len(),
                total_bits
            )));
        }
        Ok(())
    }

    /// Whether the given end of `id` has nothing attached.
    pub fn is_free_end(&self, id: LineId, end: End) -> Result<bool> {
        Ok(self.try_line(id)?.is_free(end))
    }
}
