// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Spanning tree used by the tree variants of barrier, allreduce and
//! broadcast. Ported directly from `_build_tree`: a node keeps climbing
//! one radix-sized level at a time for as long as it is the root of its
//! block, collecting a child at each surviving level; it stops, recording
//! its parent, the first time it finds itself off-root.

use pipeline::Pe;

/// Returns `(parent, children)` for `me` in an `nnodes`-node spanning tree
/// of the given `radix`. The root's own parent is itself.
#[must_use]
pub fn build_tree(me: Pe, nnodes: u32, radix: u32) -> (Pe, Vec<Pe>) {
    let radix = radix.max(2);
    let mut parent = 0;
    let mut children = Vec::new();
    let mut i: u32 = 1;
    while i <= nnodes {
        let tmp_radix = if nnodes / i < radix { nnodes / i + 1 } else { radix };
        let block = tmp_radix * i;
        let my_root = (me / block) * block;
        if my_root != me {
            parent = my_root;
            break;
        }
        parent = my_root;
        for j in 1..tmp_radix {
            let candidate = me + i * j;
            if candidate < nnodes {
                children.push(candidate);
            }
        }
        i *= radix;
    }
    // The original fills this array back-to-front (`children[k--] = ...`
    // over the same ascending traversal), so the last candidate found ends
    // up first.
    children.reverse();
    (parent, children)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eight_node_radix_two_tree_matches_the_ported_algorithm() {
        let expected: [(Pe, &[Pe]); 8] = [
            (0, &[4, 2, 1]),
            (0, &[]),
            (0, &[3]),
            (2, &[]),
            (0, &[6, 5]),
            (4, &[]),
            (4, &[7]),
            (6, &[]),
        ];
        for (me, (parent, children)) in expected.iter().enumerate() {
            let (p, c) = build_tree(me as Pe, 8, 2);
            assert_eq!(p, *parent, "node {me} parent");
            assert_eq!(c, *children, "node {me} children");
        }
    }

    #[test]
    fn every_non_root_has_exactly_one_edge_to_its_parent() {
        let nnodes = 8;
        let mut total_children = 0;
        for me in 0..nnodes {
            let (_, children) = build_tree(me, nnodes, 2);
            total_children += children.len();
        }
        assert_eq!(total_children, (nnodes - 1) as usize);
    }

    #[test]
    fn radix_of_one_is_clamped_to_two() {
        let (parent, children) = build_tree(0, 4, 1);
        assert_eq!(parent, 0);
        assert!(!children.is_empty());
    }
}
