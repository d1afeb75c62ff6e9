use std::cmp::Ordering;

use crate::{key::Key, node::LeafNode};

use super::TestConfig;

/// Data page: ascending key/value pairs. `low_bound` mirrors
/// `MemInternal`'s — used only as a tie-break for `nodecmp` when a leaf
/// is empty and has no entry of its own to compare by.
#[derive(Clone)]
pub struct MemLeaf {
    entries: Vec<(Key, Vec<u8>)>,
    low_bound: Option<Key>,
    cfg: TestConfig,
}

impl MemLeaf {
    pub fn new_empty(cfg: TestConfig) -> Self {
        Self {
            entries: Vec::new(),
            low_bound: None,
            cfg,
        }
    }

    pub fn from_pairs(pairs: Vec<(Key, Vec<u8>)>, cfg: TestConfig) -> Self {
        let mut entries = pairs;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            entries,
            low_bound: None,
            cfg,
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.binary_search_by(|e| e.0.cmp(key)).is_ok()
    }

    pub fn insert(&mut self, key: Key, value: Vec<u8>) {
        match self.entries.binary_search_by(|e| e.0.cmp(&key)) {
            Ok(idx) => self.entries[idx].1 = value,
            Err(idx) => self.entries.insert(idx, (key, value)),
        }
    }

    fn min_key(&self) -> Option<&Key> {
        self.entries.first().map(|(k, _)| k)
    }
}

impl LeafNode for MemLeaf {
    fn is_full(&self) -> bool {
        self.entries.len() >= self.cfg.max_entries
    }

    fn is_underfull(&self) -> bool {
        self.entries.len() < self.cfg.min_entries
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_mergable(&self, other: &Self) -> bool {
        self.entries.len() + other.entries.len() <= self.cfg.max_entries
    }

    fn remove(&mut self, key: &Key) -> bool {
        match self.entries.binary_search_by(|e| e.0.cmp(key)) {
            Ok(idx) => {
                self.entries.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn merge(lo: &mut Self, hi: &mut Self) {
        lo.entries.append(&mut hi.entries);
    }

    fn level(a: &mut Self, b: &mut Self) -> Option<(Key, Key)> {
        if a.is_underfull() && b.entries.len() > b.cfg.min_entries {
            let old_sep = b.min_key().expect("level called on an empty sibling").clone();
            let moved = b.entries.remove(0);
            let new_sep = b.min_key().cloned().unwrap_or_else(|| old_sep.clone());
            a.entries.push(moved);
            Some((old_sep, new_sep))
        } else if b.is_underfull() && a.entries.len() > a.cfg.min_entries {
            let old_sep = b.min_key().expect("level called on an empty sibling").clone();
            let moved = a.entries.pop().expect("level called on an empty sibling");
            let new_sep = moved.0.clone();
            b.entries.insert(0, moved);
            Some((old_sep, new_sep))
        } else {
            None
        }
    }

    fn init(&mut self) {
        self.entries.clear();
        self.low_bound = None;
    }

    fn nodecmp(a: &Self, b: &Self) -> Ordering {
        match (a.min_key(), b.min_key()) {
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
        self.entries.windows(2).all(|w| w[0].0 < w[1].0)
    }
}
