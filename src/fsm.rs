use std::cmp::Ordering;

use log::{debug, trace};

use crate::{
    block_id::BlockId,
    cache::{Cache, Event, PageGuard, Permission, Resolved, TxnId},
    error::EngineError,
    key::Key,
    node::{Backend, Node, Superblock},
    types::{EngineResult, VoidResult},
};

/// Where the FSM currently sits in the delete walk. Mirrors the phase
/// list one-for-one: a fresh `DeleteFsm` starts at `StartTransaction` and
/// a finished one sits at `Terminal` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    StartTransaction,
    AcquireSuperblock,
    AcquireRoot,
    AcquireNode,
    AcquireSibling,
    InsertRootOnCollapse,
    InsertRootOnSplit,
    DeleteComplete,
    Committing,
    Terminal,
}

/// What `delete_tuple` ultimately reports once the walk reaches
/// `delete_complete`. `Incomplete` is the FSM's own "not decided yet"
/// placeholder and never escapes to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Incomplete,
    Found,
    NotFound,
}

/// What calling `step` accomplished this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The FSM needs a page, a transaction, or a commit it cannot get
    /// synchronously. Call `step` again with the corresponding `Event`
    /// once it resolves.
    Suspended,
    /// The walk reached `Terminal`. `DeleteFsm::result()` now reports
    /// `Found` or `NotFound`.
    Done(OpResult),
}

/// Whether a synchronous repair step finished its own work and should
/// fall through to the next check, or changed `state` to something the
/// outer loop must re-dispatch on.
enum Flow {
    Continue,
    Stop,
}

/// Drives one delete through the top-down acquire/repair walk over a
/// paged cache, one page pinned under write intent at a time.
///
/// A fresh instance is driven by repeatedly calling `step` with
/// `Event::None` until it suspends, then with whatever `Event` the
/// cache's completion notifies, until `step` reports `Done`. The FSM
/// itself never blocks and never spawns anything — all the suspend
/// points are explicit `State` values the caller can persist between
/// calls if it wants the walk's progress off the stack entirely.
pub struct DeleteFsm<B: Backend> {
    state: State,
    key: Key,
    op_result: OpResult,

    txn: Option<TxnId>,

    sb_buf: Option<PageGuard<Superblock>>,

    /// The node currently under examination.
    buf: Option<PageGuard<Node<B::Internal, B::Leaf>>>,
    node_id: BlockId,

    /// The parent of `buf`, if `buf` is not the root.
    last_buf: Option<PageGuard<Node<B::Internal, B::Leaf>>>,
    last_node_id: BlockId,

    /// The sibling fetched to decide or perform a merge/level, if any.
    sib_buf: Option<PageGuard<Node<B::Internal, B::Leaf>>>,
    sib_node_id: BlockId,

    /// Set by a collapse or a root split; written into the superblock
    /// and cleared by `InsertRootOnCollapse`/`InsertRootOnSplit`.
    pending_new_root: Option<BlockId>,
}

impl<B: Backend> DeleteFsm<B> {
    pub fn new(key: Key) -> Self {
        Self {
            state: State::StartTransaction,
            key,
            op_result: OpResult::Incomplete,
            txn: None,
            sb_buf: None,
            buf: None,
            node_id: BlockId::NULL,
            last_buf: None,
            last_node_id: BlockId::NULL,
            sib_buf: None,
            sib_node_id: BlockId::NULL,
            pending_new_root: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == State::Terminal
    }

    /// The final outcome, once `step` has reported `Done`.
    pub fn result(&self) -> Option<OpResult> {
        match self.state {
            State::Terminal => Some(self.op_result),
            _ => None,
        }
    }

    /// Advance the walk by one step. `event` resumes whatever the FSM
    /// last suspended on; pass `Event::None` for the very first call and
    /// for every synchronous re-entry in between suspensions.
    pub fn step(&mut self, cache: &mut B::Cache, event: Event<B>) -> EngineResult<StepResult> {
        let mut event = event;
        loop {
            let current_event = std::mem::replace(&mut event, Event::None);
            trace!("delete fsm step: state={:?}", self.state);
            match self.state {
                State::StartTransaction => {
                    let outcome = match current_event {
                        Event::None => cache.begin_transaction()?,
                        Event::Txn(r) => r.into(),
                        _ => return Err(protocol_mismatch(self.state)),
                    };
                    match outcome {
                        crate::cache::CacheOutcome::Ready(txn) => {
                            self.txn = Some(txn);
                            self.state = State::AcquireSuperblock;
                        }
                        crate::cache::CacheOutcome::Absent => {
                            return Err(EngineError::cache("begin_transaction reported absent"));
                        }
                        crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                    }
                }

                State::AcquireSuperblock => {
                    let outcome = match current_event {
                        Event::None => {
                            cache.acquire_superblock(self.txn.unwrap(), Permission::ReadWrite)?
                        }
                        Event::Superblock(r) => r.into(),
                        _ => return Err(protocol_mismatch(self.state)),
                    };
                    match outcome {
                        crate::cache::CacheOutcome::Ready(guard) => {
                            let root = guard.root_id();
                            if root.is_null() {
                                cache.release_superblock(guard);
                                self.op_result = OpResult::NotFound;
                                self.state = State::DeleteComplete;
                            } else {
                                self.sb_buf = Some(guard);
                                self.node_id = root;
                                self.state = State::AcquireRoot;
                            }
                        }
                        crate::cache::CacheOutcome::Absent => {
                            return Err(EngineError::cache("superblock page is missing"));
                        }
                        crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                    }
                }

                State::AcquireRoot => {
                    let outcome = match current_event {
                        Event::None => {
                            cache.acquire_node(self.txn.unwrap(), self.node_id, Permission::ReadWrite)?
                        }
                        Event::Node(r) => r.into(),
                        _ => return Err(protocol_mismatch(self.state)),
                    };
                    match outcome {
                        crate::cache::CacheOutcome::Ready(guard) => {
                            self.buf = Some(guard);
                            self.state = State::AcquireNode;
                        }
                        crate::cache::CacheOutcome::Absent => {
                            debug!("root page missing on acquire, racing delete reports not-found");
                            self.op_result = OpResult::NotFound;
                            self.release_superblock_if_held(cache);
                            self.state = State::DeleteComplete;
                        }
                        crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                    }
                }

                State::AcquireNode => {
                    if self.buf.is_none() {
                        let outcome = match current_event {
                            Event::None => cache.acquire_node(
                                self.txn.unwrap(),
                                self.node_id,
                                Permission::ReadWrite,
                            )?,
                            Event::Node(r) => r.into(),
                            _ => return Err(protocol_mismatch(self.state)),
                        };
                        match outcome {
                            crate::cache::CacheOutcome::Ready(guard) => self.buf = Some(guard),
                            crate::cache::CacheOutcome::Absent => {
                                debug_assert!(false, "descent routed to a child page that does not exist");
                                return Err(EngineError::structural(
                                    "descent routed to a child page that does not exist",
                                ));
                            }
                            crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                        }
                    }
                    self.process_current_node(cache)?;
                }

                State::AcquireSibling => {
                    let outcome = match current_event {
                        Event::None => cache.acquire_node(
                            self.txn.unwrap(),
                            self.sib_node_id,
                            Permission::ReadWrite,
                        )?,
                        Event::Node(r) => r.into(),
                        _ => return Err(protocol_mismatch(self.state)),
                    };
                    match outcome {
                        crate::cache::CacheOutcome::Ready(guard) => {
                            self.sib_buf = Some(guard);
                            self.state = State::AcquireNode;
                        }
                        crate::cache::CacheOutcome::Absent => {
                            debug_assert!(false, "parent named a sibling that does not exist");
                            return Err(EngineError::structural(
                                "parent named a sibling that does not exist",
                            ));
                        }
                        crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                    }
                }

                State::InsertRootOnCollapse | State::InsertRootOnSplit => {
                    let new_root = self
                        .pending_new_root
                        .take()
                        .expect("root-identity state entered without a pending root");
                    let mut sb = self
                        .sb_buf
                        .take()
                        .expect("superblock must still be held when the root identity changes");
                    sb.set_root_id(new_root);
                    sb.set_dirty();
                    cache.release_superblock(sb);
                    self.state = State::AcquireNode;
                }

                State::DeleteComplete => {
                    self.state = State::Committing;
                }

                State::Committing => {
                    let outcome = match current_event {
                        Event::None => cache.commit(self.txn.unwrap())?,
                        Event::Commit(r) => r.into(),
                        _ => return Err(protocol_mismatch(self.state)),
                    };
                    match outcome {
                        crate::cache::CacheOutcome::Ready(()) => {
                            self.state = State::Terminal;
                            return Ok(StepResult::Done(self.op_result));
                        }
                        crate::cache::CacheOutcome::Absent => {
                            return Err(EngineError::cache("commit reported absent"));
                        }
                        crate::cache::CacheOutcome::Pending => return Ok(StepResult::Suspended),
                    }
                }

                State::Terminal => return Ok(StepResult::Done(self.op_result)),
            }
        }
    }

    fn release_superblock_if_held(&mut self, cache: &mut B::Cache) {
        if let Some(sb) = self.sb_buf.take() {
            cache.release_superblock(sb);
        }
    }

    /// Dispatch on the node category and run whichever synchronous
    /// repair/descent logic applies. Never suspends; may leave `state`
    /// unchanged (still `AcquireNode`, with `buf` cleared to descend
    /// further) or move it to `AcquireSibling`, `InsertRootOn*`, or
    /// `DeleteComplete`.
    fn process_current_node(&mut self, cache: &mut B::Cache) -> VoidResult {
        if self.buf.as_ref().unwrap().is_internal() {
            self.process_internal(cache)
        } else {
            self.process_leaf(cache)
        }
    }

    fn is_root(&self) -> bool {
        self.last_buf.is_none()
    }

    fn process_internal(&mut self, cache: &mut B::Cache) -> VoidResult {
        let underfull = self.buf.as_ref().unwrap().as_internal().unwrap().is_underfull();
        if !self.is_root() && underfull {
            if let Flow::Stop = self.handle_internal_underflow(cache)? {
                return Ok(());
            }
        }

        let full = self.buf.as_ref().unwrap().as_internal().unwrap().is_full();
        if full {
            if let Flow::Stop = self.handle_internal_full(cache)? {
                return Ok(());
            }
        }

        self.descend_internal(cache)
    }

    fn handle_internal_underflow(&mut self, cache: &mut B::Cache) -> EngineResult<Flow> {
        if self.sib_buf.is_none() {
            let sib_id = self
                .last_buf
                .as_ref()
                .unwrap()
                .as_internal()
                .unwrap()
                .sibling(&self.key);
            self.sib_node_id = sib_id;
            self.state = State::AcquireSibling;
            return Ok(Flow::Stop);
        }

        let mergable = {
            let buf_n = self.buf.as_ref().unwrap().as_internal().unwrap();
            let sib_n = self.sib_buf.as_ref().unwrap().as_internal().unwrap();
            buf_n.is_mergable(sib_n)
        };

        if mergable {
            self.merge_internal(cache)
        } else {
            self.level_internal(cache)?;
            Ok(Flow::Continue)
        }
    }

    fn merge_internal(&mut self, cache: &mut B::Cache) -> EngineResult<Flow> {
        let buf_guard = self.buf.take().unwrap();
        let sib_guard = self.sib_buf.take().unwrap();
        let order = B::Internal::nodecmp(
            buf_guard.as_internal().unwrap(),
            sib_guard.as_internal().unwrap(),
        );
        let (mut lo_guard, hi_guard) = if order != Ordering::Greater {
            (buf_guard, sib_guard)
        } else {
            (sib_guard, buf_guard)
        };
        let mut hi_guard = hi_guard;

        let parent_sep = self
            .last_buf
            .as_ref()
            .unwrap()
            .as_internal()
            .unwrap()
            .separator_between(lo_guard.id(), hi_guard.id());

        B::Internal::merge(
            lo_guard.as_internal_mut().unwrap(),
            hi_guard.as_internal_mut().unwrap(),
            parent_sep,
        );
        lo_guard.set_dirty();

        let hi_id = hi_guard.id();
        self.node_id = lo_guard.id();
        self.buf = Some(lo_guard);
        cache.release_node(hi_guard);

        let parent_singleton = self
            .last_buf
            .as_ref()
            .unwrap()
            .as_internal()
            .unwrap()
            .is_singleton();

        if parent_singleton {
            let survivor_id = self.buf.as_ref().unwrap().id();
            let parent_guard = self.last_buf.take().unwrap();
            cache.release_node(parent_guard);
            self.last_node_id = BlockId::NULL;
            self.pending_new_root = Some(survivor_id);
            self.state = State::InsertRootOnCollapse;
            Ok(Flow::Stop)
        } else {
            let parent = self.last_buf.as_mut().unwrap();
            parent.as_internal_mut().unwrap().remove_child(hi_id);
            parent.set_dirty();
            Ok(Flow::Continue)
        }
    }

    fn level_internal(&mut self, cache: &mut B::Cache) -> VoidResult {
        let buf_guard = self.buf.take().unwrap();
        let sib_guard = self.sib_buf.take().unwrap();
        let buf_id = buf_guard.id();
        let order = B::Internal::nodecmp(
            buf_guard.as_internal().unwrap(),
            sib_guard.as_internal().unwrap(),
        );
        let (mut left_guard, mut right_guard) = if order != Ordering::Greater {
            (buf_guard, sib_guard)
        } else {
            (sib_guard, buf_guard)
        };

        let parent_sep = self
            .last_buf
            .as_ref()
            .unwrap()
            .as_internal()
            .unwrap()
            .separator_between(left_guard.id(), right_guard.id());

        let work = B::Internal::level(
            left_guard.as_internal_mut().unwrap(),
            right_guard.as_internal_mut().unwrap(),
            parent_sep,
        );
        if let Some((old_sep, new_sep)) = work {
            left_guard.set_dirty();
            right_guard.set_dirty();
            let parent = self.last_buf.as_mut().unwrap();
            parent.as_internal_mut().unwrap().update_key(&old_sep, new_sep);
            parent.set_dirty();
        }

        let (buf_guard, sib_guard) = if left_guard.id() == buf_id {
            (left_guard, right_guard)
        } else {
            (right_guard, left_guard)
        };
        self.buf = Some(buf_guard);
        cache.release_node(sib_guard);
        Ok(())
    }

    fn handle_internal_full(&mut self, cache: &mut B::Cache) -> EngineResult<Flow> {
        let txn = self.txn.unwrap();
        let (right_id, mut right_plain) = cache.allocate_internal(txn)?;
        right_plain.init();

        let median = {
            let buf_internal = self.buf.as_mut().unwrap().as_internal_mut().unwrap();
            buf_internal.split(&mut right_plain)
        };
        let buf_id = self.buf.as_ref().unwrap().id();

        let mut created_new_root = false;
        if self.is_root() {
            let (parent_id, mut parent_plain) = cache.allocate_internal(txn)?;
            parent_plain.init();
            let inserted = parent_plain.insert(median, buf_id, right_id);
            debug_assert!(inserted, "freshly allocated root parent must have room");
            let mut parent_guard = parent_plain.map(Node::Internal);
            parent_guard.set_dirty();
            self.last_buf = Some(parent_guard);
            self.last_node_id = parent_id;
            self.pending_new_root = Some(parent_id);
            created_new_root = true;
        } else {
            let parent = self.last_buf.as_mut().unwrap();
            let inserted = parent.as_internal_mut().unwrap().insert(median, buf_id, right_id);
            debug_assert!(inserted, "a proactively split parent must still have room");
            parent.set_dirty();
        }

        let mut right_guard = right_plain.map(Node::Internal);
        right_guard.set_dirty();

        if self.key <= median {
            cache.release_node(right_guard);
        } else {
            let left_guard = self.buf.take().unwrap();
            cache.release_node(left_guard);
            self.node_id = right_id;
            self.buf = Some(right_guard);
        }

        if created_new_root {
            self.state = State::InsertRootOnSplit;
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }

    fn descend_internal(&mut self, cache: &mut B::Cache) -> VoidResult {
        if self.last_buf.is_some() {
            self.release_superblock_if_held(cache);
        }
        if let Some(old_parent) = self.last_buf.take() {
            cache.release_node(old_parent);
        }

        let buf_guard = self.buf.take().unwrap();
        let child_id = buf_guard.as_internal().unwrap().lookup(&self.key);
        self.last_node_id = buf_guard.id();
        self.last_buf = Some(buf_guard);
        self.node_id = child_id;
        Ok(())
    }

    fn process_leaf(&mut self, cache: &mut B::Cache) -> VoidResult {
        if self.op_result == OpResult::Incomplete {
            let found = {
                let leaf = self.buf.as_mut().unwrap().as_leaf_mut().unwrap();
                leaf.remove(&self.key)
            };
            if found {
                self.buf.as_mut().unwrap().set_dirty();
                self.op_result = OpResult::Found;
            } else {
                self.op_result = OpResult::NotFound;
            }
        }

        if !self.is_root() {
            let empty = self.buf.as_ref().unwrap().as_leaf().unwrap().is_empty();
            if empty {
                let singleton = self
                    .last_buf
                    .as_ref()
                    .unwrap()
                    .as_internal()
                    .unwrap()
                    .is_singleton();
                if singleton {
                    if self.sib_buf.is_none() {
                        let sib_id = self
                            .last_buf
                            .as_ref()
                            .unwrap()
                            .as_internal()
                            .unwrap()
                            .sibling(&self.key);
                        self.sib_node_id = sib_id;
                        self.state = State::AcquireSibling;
                        return Ok(());
                    }
                    let survivor = self.sib_buf.take().unwrap();
                    let survivor_id = survivor.id();
                    let old_leaf = self.buf.take().unwrap();
                    cache.release_node(old_leaf);
                    let old_parent = self.last_buf.take().unwrap();
                    cache.release_node(old_parent);
                    self.last_node_id = BlockId::NULL;
                    self.buf = Some(survivor);
                    self.node_id = survivor_id;
                    self.pending_new_root = Some(survivor_id);
                    self.state = State::InsertRootOnCollapse;
                    return Ok(());
                } else {
                    let old_leaf_id = self.buf.as_ref().unwrap().id();
                    let parent = self.last_buf.as_mut().unwrap();
                    parent.as_internal_mut().unwrap().remove_child(old_leaf_id);
                    parent.set_dirty();
                }
            } else if self.sib_buf.is_none() {
                let mergable_check_needs_sibling = self.buf.as_ref().unwrap().as_leaf().unwrap().is_underfull();
                if mergable_check_needs_sibling {
                    let sib_id = self
                        .last_buf
                        .as_ref()
                        .unwrap()
                        .as_internal()
                        .unwrap()
                        .sibling(&self.key);
                    self.sib_node_id = sib_id;
                    self.state = State::AcquireSibling;
                    return Ok(());
                }
            } else {
                let mergable = {
                    let buf_n = self.buf.as_ref().unwrap().as_leaf().unwrap();
                    let sib_n = self.sib_buf.as_ref().unwrap().as_leaf().unwrap();
                    buf_n.is_mergable(sib_n)
                };
                if mergable {
                    if let Flow::Stop = self.merge_leaf(cache)? {
                        return Ok(());
                    }
                } else {
                    self.level_leaf(cache)?;
                }
            }
        }

        self.finalize_leaf(cache);
        Ok(())
    }

    fn merge_leaf(&mut self, cache: &mut B::Cache) -> EngineResult<Flow> {
        let buf_guard = self.buf.take().unwrap();
        let sib_guard = self.sib_buf.take().unwrap();
        let order = B::Leaf::nodecmp(buf_guard.as_leaf().unwrap(), sib_guard.as_leaf().unwrap());
        let (mut lo_guard, hi_guard) = if order != Ordering::Greater {
            (buf_guard, sib_guard)
        } else {
            (sib_guard, buf_guard)
        };
        let mut hi_guard = hi_guard;

        B::Leaf::merge(lo_guard.as_leaf_mut().unwrap(), hi_guard.as_leaf_mut().unwrap());
        lo_guard.set_dirty();

        let hi_id = hi_guard.id();
        self.node_id = lo_guard.id();
        self.buf = Some(lo_guard);
        cache.release_node(hi_guard);

        let parent_singleton = self
            .last_buf
            .as_ref()
            .unwrap()
            .as_internal()
            .unwrap()
            .is_singleton();

        if parent_singleton {
            let survivor_id = self.buf.as_ref().unwrap().id();
            let parent_guard = self.last_buf.take().unwrap();
            cache.release_node(parent_guard);
            self.last_node_id = BlockId::NULL;
            self.pending_new_root = Some(survivor_id);
            self.state = State::InsertRootOnCollapse;
            Ok(Flow::Stop)
        } else {
            let parent = self.last_buf.as_mut().unwrap();
            parent.as_internal_mut().unwrap().remove_child(hi_id);
            parent.set_dirty();
            Ok(Flow::Continue)
        }
    }

    fn level_leaf(&mut self, cache: &mut B::Cache) -> VoidResult {
        let buf_guard = self.buf.take().unwrap();
        let sib_guard = self.sib_buf.take().unwrap();
        let buf_id = buf_guard.id();
        let order = B::Leaf::nodecmp(buf_guard.as_leaf().unwrap(), sib_guard.as_leaf().unwrap());
        let (mut left_guard, mut right_guard) = if order != Ordering::Greater {
            (buf_guard, sib_guard)
        } else {
            (sib_guard, buf_guard)
        };

        let work = B::Leaf::level(left_guard.as_leaf_mut().unwrap(), right_guard.as_leaf_mut().unwrap());
        if let Some((old_sep, new_sep)) = work {
            left_guard.set_dirty();
            right_guard.set_dirty();
            let parent = self.last_buf.as_mut().unwrap();
            parent.as_internal_mut().unwrap().update_key(&old_sep, new_sep);
            parent.set_dirty();
        }

        let (buf_guard, sib_guard) = if left_guard.id() == buf_id {
            (left_guard, right_guard)
        } else {
            (right_guard, left_guard)
        };
        self.buf = Some(buf_guard);
        cache.release_node(sib_guard);
        Ok(())
    }

    fn finalize_leaf(&mut self, cache: &mut B::Cache) {
        self.release_superblock_if_held(cache);
        if let Some(parent) = self.last_buf.take() {
            cache.release_node(parent);
        }
        if let Some(leaf) = self.buf.take() {
            cache.release_node(leaf);
        }
        self.state = State::DeleteComplete;
    }
}

fn protocol_mismatch(state: State) -> EngineError {
    debug_assert!(false, "unexpected event while in state {:?}", state);
    EngineError::protocol(format!("unexpected event while in state {:?}", state))
}
