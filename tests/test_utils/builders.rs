//! Random tree construction for property tests. This crate has no insert
//! path of its own (out of scope, see `spec.md`'s Non-goals) so building a
//! starting tree to delete from means bulk-loading leaves and routing
//! levels directly through the node handlers, the way a real storage
//! engine's bulk-loader would, rather than driving them one `insert` at a
//! time.

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use crab_delete::testkit::{MemCache, MemInternal, MemLeaf, TestConfig};
use crab_delete::{BlockId, Key};

/// `count` distinct keys, zero-padded so string order matches the
/// numeric order they were drawn in.
pub fn random_keys(rng: &mut impl Rng, count: usize) -> Vec<Key> {
    let mut pool: Vec<u32> = (0..(count as u32 * 4).max(1)).collect();
    pool.shuffle(rng);
    pool.truncate(count);
    pool.iter().map(|n| Key::from(format!("{:08}", n).as_str())).collect()
}

/// Bulk-load `keys` (must already be sorted ascending) into a fresh tree
/// under `cfg`'s fanout, returning the cache and the new root id. An empty
/// key list produces an empty tree (`BlockId::NULL` root).
pub fn bulk_load(cfg: TestConfig, keys: &[Key]) -> (MemCache, BlockId) {
    let mut cache = MemCache::new(cfg);
    if keys.is_empty() {
        return (cache, BlockId::NULL);
    }

    let leaf_size = cfg.max_entries.max(1);
    let mut level: Vec<(BlockId, Key)> = balanced_groups(keys.to_vec(), leaf_size)
        .into_iter()
        .map(|group| {
            let min = group[0].clone();
            let pairs = group.into_iter().map(|k| (k.clone(), k.as_bytes().to_vec())).collect();
            (cache.seed_leaf(MemLeaf::from_pairs(pairs, cfg)), min)
        })
        .collect();

    while level.len() > 1 {
        level = balanced_groups(level, cfg.max_children.max(2))
            .into_iter()
            .map(|group| {
                let min = group[0].1.clone();
                let children: Vec<BlockId> = group.iter().map(|(id, _)| *id).collect();
                let seps: Vec<Key> = group.iter().skip(1).map(|(_, k)| k.clone()).collect();
                (cache.seed_internal(MemInternal::from_parts(seps, children, cfg)), min)
            })
            .collect();
    }

    let root = level.into_iter().next().map(|(id, _)| id).unwrap_or(BlockId::NULL);
    cache.set_root_id(root);
    (cache, root)
}

/// Split `items` into groups of at most `max_size`, sized evenly rather
/// than packing every group but the last to capacity — a page-per-page
/// `chunks(max_size)` split can leave a final group of size 1, which for
/// an internal node is a single child with no separator at all, a
/// degenerate shape a bulk-loader has no reason to produce.
fn balanced_groups<T>(items: Vec<T>, max_size: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if n <= max_size {
        return vec![items];
    }
    let mut num_groups = (n + max_size - 1) / max_size;
    if n / num_groups < 2 {
        num_groups = (n / 2).max(1);
    }
    let base = n / num_groups;
    let extra = n % num_groups;

    let mut out = Vec::with_capacity(num_groups);
    let mut it = items.into_iter();
    for i in 0..num_groups {
        let size = if i < extra { base + 1 } else { base };
        out.push(it.by_ref().take(size).collect_vec());
    }
    out
}
