//! Shared fixtures for the integration tests: random-tree construction,
//! an integrity checker, completion drivers, and log setup.

pub mod builders;
pub mod drivers;
pub mod validate;

pub use builders::*;
pub use drivers::*;
pub use validate::*;

use std::sync::Once;

static LOG_INIT: Once = Once::new();

/// Initialize `env_logger` once per test process, so `trace!`/`debug!`
/// calls in the FSM are visible with `RUST_LOG` set.
pub fn init_log() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
