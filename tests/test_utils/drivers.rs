//! Drivers that pump a `DeleteFsm` to completion against a `MemCache`,
//! shared by every integration test so the synchronous/deferred re-entry
//! dance is written once.

use crab_delete::testkit::{MemCache, Mode};
use crab_delete::{DeleteFsm, Event, Key, OpResult, StepResult};

/// Drive a freshly-`init`ed FSM to completion against a synchronous
/// cache, feeding `Event::None` until `step` reports `Done`.
pub fn run_sync(cache: &mut MemCache, key: &str) -> OpResult {
    cache.set_mode(Mode::Sync);
    let mut fsm: DeleteFsm<crab_delete::testkit::MemBackend> = DeleteFsm::new(Key::from(key));
    loop {
        match fsm.step(cache, Event::None).expect("delete must not hard-error") {
            StepResult::Suspended => panic!("synchronous cache must never suspend"),
            StepResult::Done(result) => {
                assert!(!cache.is_pinned_anything(), "every acquired page must be released by completion");
                return result;
            }
        }
    }
}

/// Same delete, but the cache defers every acquisition — `step` must be
/// re-entered with whatever event the cache queued.
pub fn run_deferred(cache: &mut MemCache, key: &str) -> OpResult {
    cache.set_mode(Mode::Deferred);
    let mut fsm: DeleteFsm<crab_delete::testkit::MemBackend> = DeleteFsm::new(Key::from(key));
    let mut event = Event::None;
    loop {
        match fsm.step(cache, event).expect("delete must not hard-error") {
            StepResult::Suspended => {
                assert!(cache.has_pending(), "suspended step must leave an event to resume with");
                event = cache.take_event();
            }
            StepResult::Done(result) => {
                assert!(!cache.is_pinned_anything(), "every acquired page must be released by completion");
                return result;
            }
        }
    }
}
