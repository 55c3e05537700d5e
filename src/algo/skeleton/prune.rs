//! Spur removal on the spanning forest.
//!
//! A spur is a chain of nodes running from a leaf to the nearest junction
//! (degree ≥ 3). Short spurs are eroded away pass after pass; because each
//! junction always keeps at least two of its branches, the backbone through
//! it survives and is never disconnected.

use std::collections::BTreeMap;

use super::graph::SpanningTree;
use crate::geometry::SkeletonPoint;

/// A leaf-to-junction chain. `nodes` runs from the leaf inwards and does not
/// include the junction.
#[derive(Debug, Clone)]
struct Spur {
    leaf: usize,
    nodes: Vec<usize>,
    length: f64,
}

/// Walk from `leaf` until a junction. Returns `None` when the walk ends at
/// another leaf (the whole component is a simple path).
fn trace_spur(tree: &SpanningTree, points: &[SkeletonPoint], leaf: usize) -> Option<(usize, Spur)> {
    let mut nodes = vec![leaf];
    let mut length = 0.0;
    let mut prev = leaf;
    let mut cur = tree.neighbors(leaf).first()?.0;
    loop {
        length += (points[cur].position - points[prev].position).norm();
        match tree.degree(cur) {
            1 => return None,
            2 => {
                let next = tree
                    .neighbors(cur)
                    .iter()
                    .map(|&(n, _)| n)
                    .find(|&n| n != prev)?;
                nodes.push(cur);
                prev = cur;
                cur = next;
            }
            _ => {
                return Some((
                    cur,
                    Spur {
                        leaf,
                        nodes,
                        length,
                    },
                ))
            }
        }
    }
}

/// One erosion pass. Returns the number of nodes removed.
fn prune_pass(tree: &mut SpanningTree, points: &[SkeletonPoint], min_branch_length: f64) -> usize {
    let mut by_junction: BTreeMap<usize, Vec<Spur>> = BTreeMap::new();
    for node in 0..tree.num_nodes() {
        if !tree.is_alive(node) || tree.degree(node) != 1 {
            continue;
        }
        if let Some((junction, spur)) = trace_spur(tree, points, node) {
            if spur.length < min_branch_length {
                by_junction.entry(junction).or_default().push(spur);
            }
        }
    }

    let mut removed = 0;
    for (junction, mut spurs) in by_junction {
        let keep_at_least = 2;
        let removable = tree.degree(junction).saturating_sub(keep_at_least);
        spurs.sort_by(|x, y| x.length.total_cmp(&y.length).then(x.leaf.cmp(&y.leaf)));
        for spur in spurs.into_iter().take(removable) {
            for node in spur.nodes {
                tree.remove_node(node);
                removed += 1;
            }
        }
    }
    removed
}

/// Erode spurs shorter than `min_branch_length` until nothing changes or
/// `max_iterations` passes have run. Returns the total number of nodes removed.
pub(crate) fn prune_spurs(
    tree: &mut SpanningTree,
    points: &[SkeletonPoint],
    min_branch_length: f64,
    max_iterations: usize,
) -> usize {
    if min_branch_length <= 0.0 {
        return 0;
    }
    let mut total = 0;
    for pass in 0..max_iterations {
        let removed = prune_pass(tree, points, min_branch_length);
        if removed == 0 {
            log::debug!("spur pruning converged after {} passes", pass);
            break;
        }
        total += removed;
    }
    total
}
