//! Structural edits on the trace forest.
//!
//! Every edit checks all of its preconditions before the first mutation, so
//! a returned error always leaves the forest untouched.

use super::forest::Forest;
use super::line::{End, TraceLine};
use crate::error::{Result, TraceError};
use crate::geometry::{LineId, Marker};

/// How two lines are joined by a merge.
///
/// `first` supplies the head (and keeps its id and parent slot); `second`
/// supplies the tail and is always a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergePlan {
    pub(crate) first: LineId,
    pub(crate) first_reversed: bool,
    pub(crate) second: LineId,
    pub(crate) second_reversed: bool,
}

/// The end of a line a merge would join at.
///
/// Single-bit lines have one bit for both ends, so pick whichever is free.
fn join_end(line: &TraceLine, marker: Marker) -> Result<End> {
    if line.num_bits() == 1 {
        return Ok(if line.is_root() { End::Head } else { End::Tail });
    }
    line.end_of(marker).ok_or(TraceError::InvalidBoundary {
        marker,
        reason: "merge markers must be line endpoints",
    })
}

impl Forest {
    /// Split the line holding `marker` into a head part and a tail part.
    ///
    /// The marked bit becomes the last bit of the head part. The head part
    /// takes the original line's place under its parent (or among the roots);
    /// the tail part becomes a new root and inherits the original's children.
    /// Both parts get fresh ids; the original id is retired.
    ///
    /// # Errors
    ///
    /// - [`TraceError::MarkerNotFound`] if no bit carries `marker`
    /// - [`TraceError::InvalidBoundary`] if `marker` is the first or last bit
    pub fn split(&mut self, marker: Marker) -> Result<(LineId, LineId)> {
        let (id, pos) = self.locate(marker)?;
        let n = self.try_line(id)?.num_bits();
        if pos == 0 || pos + 1 >= n {
            return Err(TraceError::InvalidBoundary {
                marker,
                reason: "split point must be strictly interior",
            });
        }

        let original = self.take_line(id)?;
        let head_id = self.alloc_id();
        let tail_id = self.alloc_id();

        let mut head_bits = original.bits;
        let tail_bits = head_bits.split_off(pos + 1);

        let mut head = TraceLine::new(head_id, head_bits);
        head.parent = original.parent;
        let mut tail = TraceLine::new(tail_id, tail_bits);
        tail.children = original.children;

        self.replace_slot(id, original.parent, head_id);
        self.set_parent(&tail.children, Some(tail_id));
        self.insert_line(head);
        self.insert_line(tail);
        self.roots.push(tail_id);

        log::debug!("split line {} at {:?} into {} and {}", id, marker, head_id, tail_id);
        Ok((head_id, tail_id))
    }

    /// Work out how `a` and `b` would be joined, without mutating anything.
    pub(crate) fn plan_merge(&self, a: Marker, b: Marker) -> Result<MergePlan> {
        let (la, _) = self.locate(a)?;
        let (lb, _) = self.locate(b)?;
        if la == lb {
            return Err(TraceError::InvalidBoundary {
                marker: b,
                reason: "both markers lie on the same trace line",
            });
        }
        let line_a = self.try_line(la)?;
        let line_b = self.try_line(lb)?;
        let end_a = join_end(line_a, a)?;
        let end_b = join_end(line_b, b)?;
        if !line_a.is_free(end_a) || !line_b.is_free(end_b) {
            return Err(TraceError::NotAdjacent { first: a, second: b });
        }

        // An outer end that is still connected fixes which way the merged
        // line must run: a parent only at the head, children only at the tail.
        let outer_a = end_a.opposite();
        let outer_b = end_b.opposite();
        let pins_head = |line: &TraceLine, outer: End| outer == End::Head && !line.is_root();
        let pins_tail = |line: &TraceLine, outer: End| outer == End::Tail && !line.is_leaf();

        let plan = if !pins_tail(line_a, outer_a) && !pins_head(line_b, outer_b) {
            MergePlan {
                first: la,
                first_reversed: outer_a == End::Tail,
                second: lb,
                second_reversed: end_b == End::Tail,
            }
        } else if !pins_tail(line_b, outer_b) && !pins_head(line_a, outer_a) {
            MergePlan {
                first: lb,
                first_reversed: outer_b == End::Tail,
                second: la,
                second_reversed: end_a == End::Tail,
            }
        } else {
            return Err(TraceError::NotAdjacent { first: a, second: b });
        };

        // The merged line keeps first's parent and adopts second's children;
        // that loops back if first hangs somewhere below second.
        let first = self.try_line(plan.first)?;
        let second = self.try_line(plan.second)?;
        if first.parent.is_some() && !second.is_leaf() && self.is_ancestor(plan.second, plan.first)
        {
            return Err(TraceError::Cycle {
                ancestor: plan.first,
                line: plan.second,
            });
        }
        Ok(plan)
    }

    /// Join two lines end to end at the boundary markers `a` and `b`.
    ///
    /// Either line is reversed if needed so the merged line runs from one
    /// outer end to the other. The merged line keeps the id and parent slot of
    /// the line that supplies its head and adopts the other line's children;
    /// the other line object is removed. Returns the merged line's id.
    ///
    /// # Errors
    ///
    /// - [`TraceError::MarkerNotFound`] if either marker is absent
    /// - [`TraceError::InvalidBoundary`] if a marker is not a line endpoint,
    ///   or both markers are on the same line
    /// - [`TraceError::NotAdjacent`] if an endpoint is already connected, or
    ///   the merged line would need two parents or children at its head
    /// - [`TraceError::Cycle`] if the merged line would be its own ancestor
    pub fn merge(&mut self, a: Marker, b: Marker) -> Result<LineId> {
        let plan = self.plan_merge(a, b)?;
        self.apply_merge(plan)?;
        log::debug!("merged line {} into {}", plan.second, plan.first);
        Ok(plan.first)
    }

    fn apply_merge(&mut self, plan: MergePlan) -> Result<()> {
        let second = self.take_line(plan.second)?;
        self.roots.retain(|&r| r != plan.second);
        if plan.first_reversed {
            self.line_mut(plan.first)?.reverse_segment();
        }
        self.absorb(plan.first, second, plan.second_reversed)
    }

    /// Remove `id` from the forest.
    ///
    /// The removed line's children take its place under its former parent
    /// (or among the roots). If the parent is then left with exactly one
    /// child, parent and child are concatenated into one line, so degree-2
    /// junctions never persist. Returns the removed line.
    ///
    /// # Errors
    ///
    /// [`TraceError::LineNotFound`] if `id` is not in the forest.
    pub fn delete(&mut self, id: LineId) -> Result<TraceLine> {
        let removed = self.take_line(id)?;
        let parent = removed.parent;
        self.set_parent(&removed.children, parent);

        let slots = match parent {
            Some(p) => &mut self.line_mut(p)?.children,
            None => &mut self.roots,
        };
        if let Some(pos) = slots.iter().position(|&s| s == id) {
            slots.remove(pos);
            for (k, &c) in removed.children.iter().enumerate() {
                slots.insert(pos + k, c);
            }
        }

        if let Some(p) = parent {
            let children = self.try_line(p)?.children.clone();
            if let [only] = children[..] {
                let child = self.take_line(only)?;
                self.absorb(p, child, false)?;
                log::debug!("collapsed line {} into its parent {}", only, p);
            }
        }

        log::debug!("deleted line {} ({} bits)", id, removed.num_bits());
        Ok(removed)
    }

    /// Attach `child` below `trunk`, at the trunk's tail.
    ///
    /// The child is reversed first if its tail is nearer the trunk's tail than
    /// its head is (see [`Forest::orient`]).
    ///
    /// # Errors
    ///
    /// - [`TraceError::LineNotFound`] if either line is absent
    /// - [`TraceError::Cycle`] if `child` is `trunk` or one of its ancestors
    /// - [`TraceError::AlreadyAttached`] if `child` already has a parent
    /// - [`TraceError::Connected`] if `child` needs reversing but has children
    pub fn add_branch(&mut self, trunk: LineId, child: LineId) -> Result<()> {
        self.try_line(trunk)?;
        let child_line = self.try_line(child)?;
        if self.is_ancestor(child, trunk) {
            return Err(TraceError::Cycle {
                ancestor: child,
                line: trunk,
            });
        }
        if !child_line.is_root() {
            return Err(TraceError::AlreadyAttached { line: child });
        }
        let needs_flip = !self.orient(child, trunk)?;
        if needs_flip && !child_line.is_leaf() {
            return Err(TraceError::Connected { line: child });
        }

        if needs_flip {
            self.line_mut(child)?.reverse_segment();
        }
        self.roots.retain(|&r| r != child);
        self.line_mut(child)?.parent = Some(trunk);
        self.line_mut(trunk)?.children.push(child);
        log::debug!("attached line {} below {}", child, trunk);
        Ok(())
    }

    /// Reverse the bit order of a detached line.
    ///
    /// Applying it twice restores the original order.
    ///
    /// # Errors
    ///
    /// - [`TraceError::LineNotFound`] if `id` is absent
    /// - [`TraceError::Connected`] if the line has a parent or children
    pub fn flip(&mut self, id: LineId) -> Result<()> {
        let line = self.try_line(id)?;
        if !line.is_root() || !line.is_leaf() {
            return Err(TraceError::Connected { line: id });
        }
        self.line_mut(id)?.reverse_segment();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::forest::tests::{run, y_forest};
    use super::*;

    fn markers(forest: &Forest, id: LineId) -> Vec<usize> {
        forest.line(id).unwrap().markers().map(|m| m.index()).collect()
    }

    #[test]
    fn test_split_interior() {
        let (mut forest, root, a, b) = y_forest();
        let (head, tail) = forest.split(Marker::new(2)).unwrap();

        assert!(forest.line(root).is_none());
        assert_eq!(markers(&forest, head), vec![0, 1, 2]);
        assert_eq!(markers(&forest, tail), vec![3, 4]);
        assert_eq!(forest.line(tail).unwrap().children(), &[a, b]);
        assert_eq!(forest.line(a).unwrap().parent(), Some(tail));
        assert_eq!(forest.roots(), &[head, tail]);
        assert_eq!(forest.line_of(Marker::new(4)), Some(tail));
        forest.validate().unwrap();
    }

    #[test]
    fn test_split_child_keeps_parent_slot() {
        let (mut forest, root, a, b) = y_forest();
        let (head, tail) = forest.split(Marker::new(11)).unwrap();
        assert_eq!(forest.line(root).unwrap().children(), &[head, b]);
        assert_eq!(forest.line(head).unwrap().parent(), Some(root));
        assert!(forest.line(tail).unwrap().is_root());
        assert!(forest.line(a).is_none());
        forest.validate().unwrap();
    }

    #[test]
    fn test_split_rejects_endpoints_and_missing() {
        let (mut forest, ..) = y_forest();
        let before = forest.clone();
        assert!(matches!(
            forest.split(Marker::new(0)),
            Err(TraceError::InvalidBoundary { .. })
        ));
        assert!(matches!(
            forest.split(Marker::new(4)),
            Err(TraceError::InvalidBoundary { .. })
        ));
        assert!(matches!(
            forest.split(Marker::new(77)),
            Err(TraceError::MarkerNotFound { .. })
        ));
        assert_eq!(forest, before);
    }

    #[test]
    fn test_split_then_merge_restores_line() {
        let (mut forest, root, a, b) = y_forest();
        let original_bits = forest.line(root).unwrap().bits().to_vec();
        let (head, _tail) = forest.split(Marker::new(2)).unwrap();

        let merged = forest.merge(Marker::new(2), Marker::new(3)).unwrap();
        assert_eq!(merged, head);
        let line = forest.line(merged).unwrap();
        assert_eq!(line.bits(), &original_bits[..]);
        assert_eq!(line.children(), &[a, b]);
        assert_eq!(forest.roots(), &[merged]);
        forest.validate().unwrap();
    }

    #[test]
    fn test_merge_tail_to_tail_reverses_second() {
        let mut forest = Forest::new();
        let l1 = forest.add_root(run(0, 3, [0.0; 3], [1.0, 0.0, 0.0])).unwrap();
        let l2 = forest.add_root(run(10, 3, [6.0, 0.0, 0.0], [-1.0, 0.0, 0.0])).unwrap();
        let merged = forest.merge(Marker::new(2), Marker::new(12)).unwrap();
        assert_eq!(merged, l1);
        assert!(forest.line(l2).is_none());
        assert_eq!(markers(&forest, merged), vec![0, 1, 2, 12, 11, 10]);
        forest.validate().unwrap();
    }

    #[test]
    fn test_merge_head_to_head_keeps_attached_head() {
        let (mut forest, root, a, _) = y_forest();
        // A detached line whose head lies near the root's head.
        let loose = forest.add_root(run(40, 3, [-1.0, 0.0, 0.0], [-1.0, 0.0, 0.0])).unwrap();
        // root has children, so its tail is pinned; the loose line goes in front.
        let merged = forest.merge(Marker::new(0), Marker::new(40)).unwrap();
        assert_eq!(merged, loose);
        assert_eq!(markers(&forest, merged), vec![42, 41, 40, 0, 1, 2, 3, 4]);
        assert_eq!(forest.line(a).unwrap().parent(), Some(loose));
        assert!(forest.line(root).is_none());
        forest.validate().unwrap();
    }

    #[test]
    fn test_merge_rejects_connected_and_interior() {
        let (mut forest, ..) = y_forest();
        let before = forest.clone();
        // root tail has children.
        assert!(matches!(
            forest.merge(Marker::new(4), Marker::new(10)),
            Err(TraceError::NotAdjacent { .. })
        ));
        // interior bit.
        assert!(matches!(
            forest.merge(Marker::new(1), Marker::new(13)),
            Err(TraceError::InvalidBoundary { .. })
        ));
        // same line.
        assert!(matches!(
            forest.merge(Marker::new(10), Marker::new(13)),
            Err(TraceError::InvalidBoundary { .. })
        ));
        assert_eq!(forest, before);
    }

    #[test]
    fn test_merge_rejects_two_parents() {
        let (mut forest, _, _, _) = y_forest();
        let before = forest.clone();
        // Tails of two sibling leaves: the merged line would hang from the
        // root at both ends.
        assert!(matches!(
            forest.merge(Marker::new(13), Marker::new(22)),
            Err(TraceError::NotAdjacent { .. })
        ));
        assert_eq!(forest, before);
    }

    #[test]
    fn test_merge_rejects_cycle() {
        let (mut forest, root, a, _) = y_forest();
        // Leaf a's tail joined to the root's head: root would end up below a.
        let err = forest.merge(Marker::new(13), Marker::new(0)).unwrap_err();
        assert!(matches!(err, TraceError::Cycle { .. }), "{err:?}");
        assert!(forest.line(root).is_some());
        assert!(forest.line(a).is_some());
    }

    #[test]
    fn test_delete_collapses_degree_two() {
        let (mut forest, root, a, b) = y_forest();
        let root_bits = forest.line(root).unwrap().num_bits();
        let a_bits = forest.line(a).unwrap().num_bits();

        let removed = forest.delete(b).unwrap();
        assert_eq!(removed.id(), b);
        assert!(forest.line(a).is_none());
        let merged = forest.line(root).unwrap();
        assert_eq!(merged.num_bits(), root_bits + a_bits);
        assert!(merged.is_leaf());
        assert_eq!(forest.line_of(Marker::new(12)), Some(root));
        assert_eq!(forest.line_of(Marker::new(21)), None);
        forest.validate().unwrap();
    }

    #[test]
    fn test_delete_reparents_children() {
        let (mut forest, root, a, b) = y_forest();
        let c = forest.add_child(a, run(30, 2, [9.0, 5.0, 0.0], [1.0, 0.0, 0.0])).unwrap();
        let d = forest.add_child(a, run(40, 2, [9.0, 3.0, 0.0], [1.0, 0.0, 0.0])).unwrap();

        forest.delete(a).unwrap();
        assert_eq!(forest.line(root).unwrap().children(), &[c, d, b]);
        assert_eq!(forest.line(c).unwrap().parent(), Some(root));
        forest.validate().unwrap();
    }

    #[test]
    fn test_delete_root_promotes_children() {
        let (mut forest, root, a, b) = y_forest();
        forest.delete(root).unwrap();
        assert_eq!(forest.roots(), &[a, b]);
        assert!(forest.line(a).unwrap().is_root());
        forest.validate().unwrap();
        assert!(matches!(
            forest.delete(root),
            Err(TraceError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_add_branch_orients_child() {
        let (mut forest, _, a, _) = y_forest();
        // Tail of a is at (8, 4, 0); this line runs towards it.
        let loose = forest.add_root(run(50, 3, [8.0, 8.0, 0.0], [0.0, -1.0, 0.0])).unwrap();
        forest.add_branch(a, loose).unwrap();
        assert_eq!(markers(&forest, loose), vec![52, 51, 50]);
        assert_eq!(forest.line(a).unwrap().children(), &[loose]);
        assert!(!forest.roots().contains(&loose));
        forest.validate().unwrap();
    }

    #[test]
    fn test_add_branch_rejects_cycle_and_attached() {
        let (mut forest, root, a, b) = y_forest();
        let before = forest.clone();
        assert!(matches!(
            forest.add_branch(a, root),
            Err(TraceError::Cycle { .. })
        ));
        assert!(matches!(
            forest.add_branch(a, a),
            Err(TraceError::Cycle { .. })
        ));
        assert!(matches!(
            forest.add_branch(a, b),
            Err(TraceError::AlreadyAttached { .. })
        ));
        assert_eq!(forest, before);
    }

    #[test]
    fn test_flip_is_involution() {
        let mut forest = Forest::new();
        let id = forest.add_root(run(0, 4, [0.0; 3], [1.0, 0.0, 0.0])).unwrap();
        let before = forest.clone();
        forest.flip(id).unwrap();
        assert_eq!(markers(&forest, id), vec![3, 2, 1, 0]);
        forest.flip(id).unwrap();
        assert_eq!(forest, before);
    }

    #[test]
    fn test_flip_rejects_connected() {
        let (mut forest, root, a, _) = y_forest();
        assert!(matches!(forest.flip(root), Err(TraceError::Connected { .. })));
        assert!(matches!(forest.flip(a), Err(TraceError::Connected { .. })));
    }
}
