//! An in-memory reference implementation of `Backend`/`Cache`, used to
//! exercise the delete FSM in tests and (potentially) benches. This is
//! genuinely a second, independent node-handler/cache implementation —
//! not a mock of the FSM's own logic — so that driving a `DeleteFsm`
//! against it is a meaningful end-to-end exercise of the real algorithm.
//!
//! Nothing in `fsm`, `node`, or `cache` depends on this module; it only
//! depends on the traits they expose, the same as any other backend
//! would.

mod internal;
mod leaf;

pub use internal::MemInternal;
pub use leaf::MemLeaf;

use std::collections::{HashSet, VecDeque};

use crate::{
    block_id::BlockId,
    cache::{Cache, CacheOutcome, Event, PageGuard, Permission, Resolved, TxnId},
    node::{Backend, Node, Superblock},
    types::EngineResult,
};

/// Fanout knobs for the in-memory node handlers. Kept deliberately small
/// so that a handful of keys is enough to exercise splits, merges,
/// levels, and root collapses in a test.
#[derive(Debug, Clone, Copy)]
pub struct TestConfig {
    /// Maximum children an internal node may hold (one more than its
    /// maximum separator count).
    pub max_children: usize,
    /// Minimum children a non-root internal node may hold before it is
    /// `is_underfull`.
    pub min_children: usize,
    /// Maximum key/value entries a leaf may hold.
    pub max_entries: usize,
    /// Minimum key/value entries a non-root leaf may hold before it is
    /// `is_underfull`.
    pub min_entries: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_children: 5,
            min_children: 3,
            max_entries: 4,
            min_entries: 2,
        }
    }
}

/// The `Backend` bundle the delete FSM is instantiated against in tests.
pub struct MemBackend;

impl Backend for MemBackend {
    type Internal = MemInternal;
    type Leaf = MemLeaf;
    type Cache = MemCache;
}

/// Whether `MemCache` resolves acquisitions synchronously or always
/// defers them to an explicit event the driver must deliver. `Deferred`
/// is what property 6 (§8) is checked against: the same tree, the same
/// delete, driven entirely through `Event` replies instead of direct
/// returns, must land on the same post-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Deferred,
}

/// A tiny buffer pool: a page table keyed by `BlockId`, a pin set (so a
/// double-acquire of the same page is a loud bug rather than silent
/// aliasing), and an allocation counter. `Send + Sync` (nothing here
/// actually needs it, since the FSM itself is single-threaded
/// cooperative — see `fsm`'s docs — but a test driver that wants to hold
/// the cache across threads while manually sequencing event delivery
/// should not have to fight the type system to do it).
pub struct MemCache {
    cfg: TestConfig,
    storage: std::collections::HashMap<BlockId, Node<MemInternal, MemLeaf>>,
    superblock: Superblock,
    next_id: u64,
    pinned: HashSet<BlockId>,
    pending: VecDeque<Event<MemBackend>>,
    mode: Mode,
    txn_seq: u64,
}

unsafe impl Send for MemCache {}
unsafe impl Sync for MemCache {}

const SUPERBLOCK_ID: BlockId = BlockId::new(1);

impl MemCache {
    pub fn new(cfg: TestConfig) -> Self {
        Self {
            cfg,
            storage: std::collections::HashMap::new(),
            superblock: Superblock::new(BlockId::NULL),
            next_id: SUPERBLOCK_ID.raw(),
            pinned: HashSet::new(),
            pending: VecDeque::new(),
            mode: Mode::Sync,
            txn_seq: 0,
        }
    }

    pub fn with_mode(cfg: TestConfig, mode: Mode) -> Self {
        let mut c = Self::new(cfg);
        c.mode = mode;
        c
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn config(&self) -> TestConfig {
        self.cfg
    }

    pub fn root_id(&self) -> BlockId {
        self.superblock.root_id()
    }

    pub fn set_root_id(&mut self, id: BlockId) {
        self.superblock.set_root_id(id);
    }

    /// Allocate a block id and store a leaf under it, returning the id.
    /// Used by test tree-builders to seed a starting state without going
    /// through the FSM.
    pub fn seed_leaf(&mut self, leaf: MemLeaf) -> BlockId {
        let id = self.fresh_id();
        self.storage.insert(id, Node::Leaf(leaf));
        id
    }

    pub fn seed_internal(&mut self, internal: MemInternal) -> BlockId {
        let id = self.fresh_id();
        self.storage.insert(id, Node::Internal(internal));
        id
    }

    /// Direct (unpinned) read of a stored node, for test assertions.
    pub fn peek(&self, id: BlockId) -> Option<&Node<MemInternal, MemLeaf>> {
        self.storage.get(&id)
    }

    pub fn is_pinned_anything(&self) -> bool {
        !self.pinned.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.storage.len()
    }

    fn fresh_id(&mut self) -> BlockId {
        self.next_id += 1;
        BlockId::new(self.next_id)
    }

    /// Pop the next deferred event, for a test driver resuming a
    /// suspended FSM. Panics if nothing is pending, since calling this
    /// without a prior `Suspended` result is a driver bug, not a runtime
    /// condition to handle gracefully.
    pub fn take_event(&mut self) -> Event<MemBackend> {
        self.pending
            .pop_front()
            .expect("take_event called with no pending event")
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn defer_or<T>(
        &mut self,
        wrap: impl FnOnce(Resolved<T>) -> Event<MemBackend>,
        value: Resolved<T>,
    ) -> CacheOutcome<T> {
        match self.mode {
            Mode::Sync => value.into(),
            Mode::Deferred => {
                self.pending.push_back(wrap(value));
                CacheOutcome::Pending
            }
        }
    }
}

impl Cache<MemBackend> for MemCache {
    fn superblock_id(&self) -> BlockId {
        SUPERBLOCK_ID
    }

    fn begin_transaction(&mut self) -> EngineResult<CacheOutcome<TxnId>> {
        self.txn_seq += 1;
        let txn = TxnId::new(self.txn_seq);
        Ok(self.defer_or(Event::Txn, Resolved::Ready(txn)))
    }

    fn acquire_superblock(
        &mut self,
        _txn: TxnId,
        _mode: Permission,
    ) -> EngineResult<CacheOutcome<PageGuard<Superblock>>> {
        assert!(
            self.pinned.insert(SUPERBLOCK_ID),
            "superblock acquired while already pinned"
        );
        let guard = PageGuard::new(SUPERBLOCK_ID, self.superblock);
        Ok(self.defer_or(Event::Superblock, Resolved::Ready(guard)))
    }

    fn acquire_node(
        &mut self,
        _txn: TxnId,
        id: BlockId,
        _mode: Permission,
    ) -> EngineResult<CacheOutcome<PageGuard<Node<MemInternal, MemLeaf>>>> {
        if id.is_null() {
            return Ok(self.defer_or(Event::Node, Resolved::Absent));
        }
        let node = match self.storage.get(&id) {
            Some(n) => n.clone(),
            None => return Ok(self.defer_or(Event::Node, Resolved::Absent)),
        };
        assert!(
            self.pinned.insert(id),
            "page {:?} acquired while already pinned",
            id
        );
        let guard = PageGuard::new(id, node);
        Ok(self.defer_or(Event::Node, Resolved::Ready(guard)))
    }

    fn allocate_internal(&mut self, _txn: TxnId) -> EngineResult<(BlockId, PageGuard<MemInternal>)> {
        let id = self.fresh_id();
        let node = MemInternal::new_empty(self.cfg);
        self.storage.insert(id, Node::Internal(node.clone()));
        self.pinned.insert(id);
        Ok((id, PageGuard::new(id, node)))
    }

    fn allocate_leaf(&mut self, _txn: TxnId) -> EngineResult<(BlockId, PageGuard<MemLeaf>)> {
        let id = self.fresh_id();
        let node = MemLeaf::new_empty(self.cfg);
        self.storage.insert(id, Node::Leaf(node.clone()));
        self.pinned.insert(id);
        Ok((id, PageGuard::new(id, node)))
    }

    fn release_superblock(&mut self, guard: PageGuard<Superblock>) {
        let id = guard.id();
        let dirty = guard.is_dirty();
        let node = guard.into_inner();
        if dirty {
            self.superblock = node;
        }
        assert!(self.pinned.remove(&id), "released a superblock that was not pinned");
    }

    fn release_node(&mut self, guard: PageGuard<Node<MemInternal, MemLeaf>>) {
        let id = guard.id();
        let dirty = guard.is_dirty();
        let node = guard.into_inner();
        if dirty {
            self.storage.insert(id, node);
        }
        assert!(self.pinned.remove(&id), "released page {:?} that was not pinned", id);
    }

    fn commit(&mut self, _txn: TxnId) -> EngineResult<CacheOutcome<()>> {
        Ok(self.defer_or(Event::Commit, Resolved::Ready(())))
    }
}
