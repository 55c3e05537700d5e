//! Backbone extraction: decompose each spanning tree into trace-line segments.
//!
//! The longest weighted path of a component becomes the trunk. Starting from
//! one end of it, the tree is walked depth first; a segment grows while the
//! current node has exactly one unvisited neighbor and ends at a leaf or a
//! junction. At a junction the trunk continuation is the first child
//! segment, the other branches follow in ascending node order.

use super::graph::SpanningTree;

/// One future trace line: a run of node indices plus the index of its
/// parent segment (segments are listed in pre-order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) nodes: Vec<usize>,
    pub(crate) parent: Option<usize>,
}

/// Weighted distances from `start` over the tree; returns the farthest node
/// (smallest index on ties) and the predecessor map.
fn farthest_from(tree: &SpanningTree, start: usize) -> (usize, Vec<Option<usize>>) {
    let n = tree.num_nodes();
    let mut dist = vec![0.0; n];
    let mut pred = vec![None; n];
    let mut visited = vec![false; n];
    visited[start] = true;
    let mut stack = vec![start];
    let mut best = (start, 0.0);
    while let Some(node) = stack.pop() {
        let d = dist[node];
        if d > best.1 || (d == best.1 && node < best.0) {
            best = (node, d);
        }
        for &(next, w) in tree.neighbors(node) {
            if !visited[next] {
                visited[next] = true;
                dist[next] = d + w;
                pred[next] = Some(node);
                stack.push(next);
            }
        }
    }
    (best.0, pred)
}

/// The longest weighted path of the component containing `start`, by double
/// sweep.
pub(crate) fn longest_path(tree: &SpanningTree, start: usize) -> Vec<usize> {
    let (u, _) = farthest_from(tree, start);
    let (v, pred) = farthest_from(tree, u);
    let mut path = vec![v];
    let mut cur = v;
    while let Some(p) = pred[cur] {
        path.push(p);
        cur = p;
    }
    path
}

/// Split one component into segments in pre-order.
///
/// `component` must be sorted ascending and non-empty.
pub(crate) fn decompose(tree: &SpanningTree, component: &[usize]) -> Vec<Segment> {
    let Some(&first) = component.first() else {
        return Vec::new();
    };
    let path = longest_path(tree, first);
    let start = match (path.first(), path.last()) {
        (Some(&a), Some(&b)) => a.min(b),
        _ => first,
    };

    let n = tree.num_nodes();
    let mut on_path = vec![false; n];
    for &p in &path {
        on_path[p] = true;
    }
    let mut visited = vec![false; n];
    let mut segments = Vec::new();
    let mut stack: Vec<(usize, Option<usize>)> = vec![(start, None)];

    while let Some((head, parent)) = stack.pop() {
        let mut nodes = vec![head];
        visited[head] = true;
        let mut cur = head;
        let branches = loop {
            let mut next: Vec<usize> = tree
                .neighbors(cur)
                .iter()
                .map(|&(nb, _)| nb)
                .filter(|&nb| !visited[nb])
                .collect();
            match next.len() {
                0 => break next,
                1 => {
                    cur = next[0];
                    visited[cur] = true;
                    nodes.push(cur);
                }
                _ => {
                    next.sort_unstable_by_key(|&nb| (!on_path[nb], nb));
                    break next;
                }
            }
        };

        let index = segments.len();
        segments.push(Segment { nodes, parent });
        for &b in branches.iter().rev() {
            stack.push((b, Some(index)));
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_tree(n: usize) -> SpanningTree {
        let mut tree = SpanningTree::new(n);
        for i in 0..n - 1 {
            tree.add_edge(i, i + 1, 1.0);
        }
        tree
    }

    #[test]
    fn test_path_is_one_segment() {
        let tree = path_tree(6);
        let segments = decompose(&tree, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(
            segments,
            vec![Segment {
                nodes: vec![0, 1, 2, 3, 4, 5],
                parent: None
            }]
        );
    }

    #[test]
    fn test_single_node() {
        let tree = SpanningTree::new(3);
        let segments = decompose(&tree, &[2]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].nodes, vec![2]);
    }

    #[test]
    fn test_branch_after_trunk_continuation() {
        // Trunk 0-1-2-3-4-5-6 with a short branch 7-8 hanging off node 2.
        let mut tree = SpanningTree::new(9);
        for i in 0..6 {
            tree.add_edge(i, i + 1, 1.0);
        }
        tree.add_edge(2, 7, 1.0);
        tree.add_edge(7, 8, 1.0);

        let segments = decompose(&tree, &(0..9).collect::<Vec<_>>());
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].nodes, vec![0, 1, 2]);
        assert_eq!(segments[1].nodes, vec![3, 4, 5, 6]);
        assert_eq!(segments[1].parent, Some(0));
        assert_eq!(segments[2].nodes, vec![7, 8]);
        assert_eq!(segments[2].parent, Some(0));
    }

    #[test]
    fn test_longest_path_by_weight() {
        // Two arms from node 0: 0-1 (weight 5) and 0-2-3 (weights 1, 1).
        let mut tree = SpanningTree::new(4);
        tree.add_edge(0, 1, 5.0);
        tree.add_edge(0, 2, 1.0);
        tree.add_edge(2, 3, 1.0);
        let mut path = longest_path(&tree, 0);
        path.sort_unstable();
        assert_eq!(path, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_nan_weights_terminate() {
        let mut tree = SpanningTree::new(4);
        tree.add_edge(0, 1, f64::NAN);
        tree.add_edge(1, 2, f64::NAN);
        tree.add_edge(2, 3, 1.0);
        let segments = decompose(&tree, &[0, 1, 2, 3]);
        let mut nodes: Vec<usize> = segments.iter().flat_map(|s| s.nodes.clone()).collect();
        nodes.sort_unstable();
        assert_eq!(nodes, vec![0, 1, 2, 3]);
    }
}
