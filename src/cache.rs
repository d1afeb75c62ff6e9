use crate::{
    block_id::BlockId,
    node::{Backend, Node, Superblock},
    types::EngineResult,
};

/// Lock mode a page is acquired under. The delete FSM only ever asks for
/// `ReadWrite` (structural modification always needs write intent), but
/// the trait keeps `ReadOnly` so the same cache can serve readers
/// concurrently without a second interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction handle. Carries no behavior of its own — all
/// mutation goes through `Cache` methods that take it as a capability
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(u64);

impl TxnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A pinned page, exclusively owned by whoever acquired it. Dropping a
/// guard without handing it to `Cache::release_*` is a resource leak —
/// the cache's own pin bookkeeping is the source of truth for "no
/// leaks", not a `Drop` impl here, since a guard is routinely swapped
/// between `buf`/`last_buf`/`sib_buf` fields on the FSM well before it is
/// actually released.
pub struct PageGuard<T> {
    id: BlockId,
    node: T,
    dirty: bool,
}

impl<T> PageGuard<T> {
    pub fn new(id: BlockId, node: T) -> Self {
        Self {
            id,
            node,
            dirty: false,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PageGuard<U> {
        PageGuard {
            id: self.id,
            node: f(self.node),
            dirty: self.dirty,
        }
    }

    /// Unwrap the guard, discarding pin/dirty bookkeeping. Used by a
    /// `Cache` implementation's own `release_*` to get at the node it
    /// must write back (or drop, if not dirty).
    pub fn into_inner(self) -> T {
        self.node
    }
}

impl<T: Clone> Clone for PageGuard<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            node: self.node.clone(),
            dirty: self.dirty,
        }
    }
}

impl<T> std::ops::Deref for PageGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T> std::ops::DerefMut for PageGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.node
    }
}

/// The outcome of a call into the cache that may need to defer. `Ready`
/// is the synchronous-grant case, `Pending` means the caller must
/// suspend and wait for a later event, and `Absent` is the benign
/// "no data" signal distinct from both — the page genuinely does not
/// exist (e.g. a null root on a race).
pub enum CacheOutcome<T> {
    Ready(T),
    Absent,
    Pending,
}

/// The resolved half of `CacheOutcome` — what a cache event can still be
/// once it has actually completed. `Pending` cannot appear in an event;
/// an event, by construction, reports a finished acquisition.
pub enum Resolved<T> {
    Ready(T),
    Absent,
}

impl<T> From<Resolved<T>> for CacheOutcome<T> {
    fn from(r: Resolved<T>) -> Self {
        match r {
            Resolved::Ready(t) => CacheOutcome::Ready(t),
            Resolved::Absent => CacheOutcome::Absent,
        }
    }
}

/// What `step` is re-entered with. `None` is the synchronous re-entry
/// case; the rest correspond to a pinned page handle becoming available,
/// an allocation completing, or a transaction becoming durable.
pub enum Event<B: Backend> {
    None,
    Txn(Resolved<TxnId>),
    Superblock(Resolved<PageGuard<Superblock>>),
    Node(Resolved<PageGuard<Node<B::Internal, B::Leaf>>>),
    Commit(Resolved<()>),
}

/// The buffer cache / transaction manager collaborator, consumed but not
/// implemented here. A hard error return (as opposed to `CacheOutcome`)
/// corresponds to a fatal, unrecoverable cache/AIO failure.
pub trait Cache<B: Backend> {
    fn superblock_id(&self) -> BlockId;

    fn is_block_id_null(&self, id: BlockId) -> bool {
        id.is_null()
    }

    fn begin_transaction(&mut self) -> EngineResult<CacheOutcome<TxnId>>;

    fn acquire_superblock(
        &mut self,
        txn: TxnId,
        mode: Permission,
    ) -> EngineResult<CacheOutcome<PageGuard<Superblock>>>;

    fn acquire_node(
        &mut self,
        txn: TxnId,
        id: BlockId,
        mode: Permission,
    ) -> EngineResult<CacheOutcome<PageGuard<Node<B::Internal, B::Leaf>>>>;

    /// Allocate a fresh internal-node page. Always synchronous.
    fn allocate_internal(&mut self, txn: TxnId) -> EngineResult<(BlockId, PageGuard<B::Internal>)>;

    /// Allocate a fresh leaf-node page. Always synchronous.
    fn allocate_leaf(&mut self, txn: TxnId) -> EngineResult<(BlockId, PageGuard<B::Leaf>)>;

    fn release_superblock(&mut self, guard: PageGuard<Superblock>);

    fn release_node(&mut self, guard: PageGuard<Node<B::Internal, B::Leaf>>);

    fn commit(&mut self, txn: TxnId) -> EngineResult<CacheOutcome<()>>;
}
