//! A concurrent B-tree deletion engine over a paged, transactional
//! buffer cache.
//!
//! This crate implements the top-down structural-modification algorithm
//! for deletion — acquiring pages under write intent, detecting
//! underfull nodes, acquiring siblings, and choosing between merge,
//! level (redistribute), and root-collapse — while preserving B-tree
//! invariants across an asynchronous page I/O interface that may force
//! the operation to suspend and resume at any page acquisition.
//!
//! The on-disk page format, the buffer cache, the transaction manager,
//! and the leaf/internal byte layouts are external collaborators,
//! consumed here as the [`node::Backend`]/[`cache::Cache`] traits rather
//! than implemented. [`testkit`] ships one reference implementation of
//! both, for tests only — it is not "the" backend.

mod block_id;
mod cache;
mod config;
mod error;
mod fsm;
mod key;
mod node;
mod types;

#[cfg(feature = "testkit")]
pub mod testkit;

pub use block_id::BlockId;
pub use cache::{Cache, CacheOutcome, Event, PageGuard, Permission, Resolved, TxnId};
pub use config::Config;
pub use error::EngineError;
pub use fsm::{DeleteFsm, OpResult, State, StepResult};
pub use key::{Key, MAX_KEY_SIZE};
pub use node::{Backend, InternalNode, LeafNode, Node, Superblock};
pub use types::{EngineResult, VoidResult};
