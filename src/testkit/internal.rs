use std::cmp::Ordering;

use crate::{block_id::BlockId, key::Key, node::InternalNode};

use super::TestConfig;

/// Routing node: ascending separators plus one more child than
/// separators. `nodecmp` orders two siblings by their first separator;
/// `low_bound` is only consulted as a fallback when one side has none
/// (the single-child node a merge/level can transiently leave behind). It
/// is the separator a prior split assigned this node as its own lower
/// bound, or `None` for whichever node is currently leftmost in the whole
/// tree — exactly one live node carries `None` at a time, since every
/// other node was produced as the *right* half of a `split`, which always
/// stamps a `Some` bound on its output.
#[derive(Clone)]
pub struct MemInternal {
    seps: Vec<Key>,
    children: Vec<BlockId>,
    low_bound: Option<Key>,
    cfg: TestConfig,
}

impl MemInternal {
    pub fn new_empty(cfg: TestConfig) -> Self {
        Self {
            seps: Vec::new(),
            children: Vec::new(),
            low_bound: None,
            cfg,
        }
    }

    /// Build directly from a separator list and children, for test tree
    /// fixtures that want a specific starting shape.
    pub fn from_parts(seps: Vec<Key>, children: Vec<BlockId>, cfg: TestConfig) -> Self {
        assert_eq!(children.len(), seps.len() + 1, "children must outnumber separators by one");
        Self {
            seps,
            children,
            low_bound: None,
            cfg,
        }
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn separators(&self) -> &[Key] {
        &self.seps
    }

    fn route_index(&self, key: &Key) -> usize {
        self.seps.partition_point(|s| s <= key)
    }
}

impl InternalNode for MemInternal {
    fn is_full(&self) -> bool {
        self.children.len() >= self.cfg.max_children
    }

    fn is_underfull(&self) -> bool {
        self.children.len() < self.cfg.min_children
    }

    fn is_singleton(&self) -> bool {
        self.seps.len() == 1
    }

    fn is_mergable(&self, other: &Self) -> bool {
        self.seps.len() + other.seps.len() + 1 <= self.cfg.max_children - 1
    }

    fn lookup(&self, key: &Key) -> BlockId {
        self.children[self.route_index(key)]
    }

    fn sibling(&self, key: &Key) -> BlockId {
        let idx = self.route_index(key);
        if idx > 0 {
            self.children[idx - 1]
        } else {
            self.children[idx + 1]
        }
    }

    fn separator_between(&self, left: BlockId, right: BlockId) -> Key {
        for i in 0..self.seps.len() {
            if self.children[i] == left && self.children[i + 1] == right {
                return self.seps[i].clone();
            }
        }
        panic!("{:?} and {:?} are not adjacent children of this node", left, right);
    }

    fn split(&mut self, right: &mut Self) -> Key {
        let mid = self.seps.len() / 2;
        right.seps = self.seps.split_off(mid + 1);
        right.children = self.children.split_off(mid + 1);
        let median = self.seps.pop().expect("split called on a node with no median separator");
        right.low_bound = Some(median.clone());
        median
    }

    fn merge(lo: &mut Self, hi: &mut Self, parent_separator: Key) {
        lo.seps.push(parent_separator);
        lo.seps.append(&mut hi.seps);
        lo.children.append(&mut hi.children);
    }

    fn level(a: &mut Self, b: &mut Self, parent_separator: Key) -> Option<(Key, Key)> {
        if a.is_underfull() && b.children.len() > b.cfg.min_children {
            // Borrow b's leftmost child; the old parent separator slides
            // down to become a's new trailing separator and b's old
            // leading separator slides up to replace it.
            let moved_child = b.children.remove(0);
            a.children.push(moved_child);
            a.seps.push(parent_separator.clone());
            let new_sep = b.seps.remove(0);
            Some((parent_separator, new_sep))
        } else if b.is_underfull() && a.children.len() > a.cfg.min_children {
            let moved_child = a.children.pop().unwrap();
            b.children.insert(0, moved_child);
            let new_sep = a.seps.pop().unwrap();
            b.seps.insert(0, parent_separator.clone());
            Some((parent_separator, new_sep))
        } else {
            None
        }
    }

    fn insert(&mut self, sep: Key, left: BlockId, right: BlockId) -> bool {
        if self.children.len() >= self.cfg.max_children {
            return false;
        }
        if self.children.is_empty() {
            // A freshly allocated parent (the root-split case) starts with
            // no children at all — `left` is not found because it is not
            // there yet, not because it is missing from an existing node.
            self.children.push(left);
            self.children.push(right);
            self.seps.push(sep);
            return true;
        }
        let idx = self
            .children
            .iter()
            .position(|&c| c == left)
            .expect("insert called with a left child not present in this node");
        self.seps.insert(idx, sep);
        self.children.insert(idx + 1, right);
        true
    }

    fn remove_child(&mut self, child: BlockId) -> Key {
        let idx = self
            .children
            .iter()
            .position(|&c| c == child)
            .expect("remove_child called with a block id that is not a child of this node");
        self.children.remove(idx);
        if idx == 0 {
            self.seps.remove(0)
        } else {
            self.seps.remove(idx - 1)
        }
    }

    fn update_key(&mut self, old_sep: &Key, new_sep: Key) {
        let slot = self
            .seps
            .iter_mut()
            .find(|s| *s == old_sep)
            .expect("update_key called with a separator not present in this node");
        *slot = new_sep;
    }

    fn init(&mut self) {
        self.seps.clear();
        self.children.clear();
        self.low_bound = None;
    }

    fn nodecmp(a: &Self, b: &Self) -> Ordering {
        // Two siblings under the same parent always have every separator
        // of the left one below every separator of the right one, so the
        // first separator alone orders them correctly — mirrors
        // `MemLeaf::nodecmp` comparing `min_key()` first. `low_bound` is
        // only the fallback for the degenerate single-child (zero
        // separator) node a prior repair can leave behind.
        match (a.seps.first(), b.seps.first()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => match (&a.low_bound, &b.low_bound) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(y),
            },
        }
    }

    fn validate(&self) -> bool {
        if self.children.len() != self.seps.len() + 1 {
            return false;
        }
        self.seps.windows(2).all(|w| w[0] < w[1])
    }
}
