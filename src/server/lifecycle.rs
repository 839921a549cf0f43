//! Process lifecycle control
//!
//! `shutdown` and `notifications/exit` terminate the process. The actual
//! exit call sits behind this narrow trait so dispatcher tests can observe
//! terminal transitions without killing the test runner.

use tracing::info;

/// Terminates the process on behalf of the dispatcher.
pub trait LifecycleController: Send + Sync {
    /// Exit the process with the given code.
    fn exit(&self, code: i32);
}

/// Production controller: really exits.
#[derive(Debug, Default)]
pub struct ProcessLifecycle;

impl LifecycleController for ProcessLifecycle {
    fn exit(&self, code: i32) {
        info!(code, "Terminating process");
        std::process::exit(code);
    }
}
