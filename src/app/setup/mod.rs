//! Toolchain provisioning: task contract, task implementations, coordinator
//!
//! Provisioning work (downloading Blender, the fitter core, the add-on, and
//! installing each) is expressed as [`SetupTask`]s driven to completion by
//! the [`SetupCoordinator`]. Tasks never block: `start()` kicks off an
//! operation and returns immediately, and `poll()` is invoked once per
//! coordinator tick until the task reports it is no longer running.

pub mod coordinator;
pub mod registry;
pub mod tasks;

use std::sync::{Arc, Mutex};

pub use coordinator::{EntryStatus, SetupCoordinator, SetupEntry, SetupEvent, SetupPhase};
pub use registry::{ids, standard_entries, ComponentPaths};
pub use tasks::{
    ArchiveExtractor, DownloadTask, InstallTask, SystemArchiveExtractor, ValidationTask,
};

/// Outcome of one task step
///
/// Immutable once constructed. `poll()` returns `Success` exactly once, on
/// the transition to done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// The operation finished successfully
    Success,
    /// The operation is still running; `detail` describes the current step
    InProgress { detail: String },
    /// The operation failed terminally
    Failed { message: String },
}

impl TaskResult {
    /// In-progress result with a detail message
    pub fn in_progress(detail: impl Into<String>) -> Self {
        Self::InProgress {
            detail: detail.into(),
        }
    }

    /// Failed result with a user-facing message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A unit of provisioning work with a start/poll/abort lifecycle
///
/// Implementations must satisfy the contract:
///
/// - `start()` begins the operation and returns immediately; it never
///   blocks until completion.
/// - `poll()` is called repeatedly until `is_running()` turns false and
///   returns `Success` exactly once, on the transition to done.
/// - `abort()` is safe at any time (no-op when not running) and releases
///   any held resource, deleting partial output.
/// - `is_ready()` is a pure function of durable on-disk state, never of
///   `is_running()`, so readiness survives process restarts.
pub trait SetupTask: Send {
    /// Whether an operation started in this process is still in flight
    fn is_running(&self) -> bool;

    /// Whether the task's durable outcome already exists on disk
    fn is_ready(&self) -> bool;

    /// Progress of the in-flight operation in `[0, 1]`
    fn progress(&self) -> f32;

    /// Begin the operation
    fn start(&mut self) -> TaskResult;

    /// Advance and observe the in-flight operation
    fn poll(&mut self) -> TaskResult;

    /// Cancel the in-flight operation, deleting partial output
    fn abort(&mut self);
}

/// A task shared between a coordinator entry and prerequisite references
///
/// Tasks are polled from the tick loop only; the mutex guards the brief
/// cross-reference from prerequisite checks.
pub type SharedTask = Arc<Mutex<dyn SetupTask>>;

/// Wrap a concrete task for use in coordinator entries
pub fn shared<T: SetupTask + 'static>(task: T) -> SharedTask {
    Arc::new(Mutex::new(task))
}
