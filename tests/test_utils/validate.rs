//! Structural integrity checks for a tree in a `MemCache`, independent of
//! the FSM's own bookkeeping — used by the random-workload property test
//! to confirm every delete leaves a valid B-tree behind, not just the one
//! the FSM thinks it left behind.

use crab_delete::testkit::MemCache;
use crab_delete::{BlockId, Key, Node};

/// Walk the tree under `root`, asserting at every node that:
/// - `Node::validate()` holds (ascending separators/keys, correct
///   child/separator count),
/// - every key in a subtree falls strictly between the bounds its parent
///   separators imply.
///
/// Returns every key in the tree, in ascending order, so the caller can
/// also check membership against the expected set.
pub fn check_integrity(cache: &MemCache, root: BlockId) -> Vec<Key> {
    if root.is_null() {
        return Vec::new();
    }
    let mut out = Vec::new();
    walk(cache, root, None, None, &mut out);
    out
}

fn walk(cache: &MemCache, id: BlockId, lower: Option<&Key>, upper: Option<&Key>, out: &mut Vec<Key>) {
    let node = cache.peek(id).unwrap_or_else(|| panic!("dangling child id {:?} reachable from the tree", id));

    assert!(node.validate(), "{:?} fails its own structural invariants", id);

    match node {
        Node::Leaf(leaf) => {
            let keys = leaf.keys();
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "{:?} holds out-of-order keys", id);
            for k in &keys {
                check_bounds(k, lower, upper, id);
            }
            out.extend(keys);
        }
        Node::Internal(internal) => {
            let children = internal.children();
            let seps = internal.separators();
            assert_eq!(children.len(), seps.len() + 1, "{:?} has a children/separator count mismatch", id);

            for (i, &child) in children.iter().enumerate() {
                let child_lower = if i == 0 { lower } else { Some(&seps[i - 1]) };
                let child_upper = if i == children.len() - 1 { upper } else { Some(&seps[i]) };
                walk(cache, child, child_lower, child_upper, out);
            }
        }
    }
}

fn check_bounds(key: &Key, lower: Option<&Key>, upper: Option<&Key>, id: BlockId) {
    if let Some(lo) = lower {
        assert!(key >= lo, "{:?} holds {:?} below its lower bound {:?}", id, key, lo);
    }
    if let Some(hi) = upper {
        assert!(key < hi, "{:?} holds {:?} at or above its upper bound {:?}", id, key, hi);
    }
}
