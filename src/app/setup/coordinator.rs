//! Sequential setup coordination with prerequisite gating and cancellation
//!
//! The coordinator owns an ordered list of [`SetupEntry`] values and drives
//! each entry's task to completion, one at a time. It is an explicit state
//! machine advanced by an external [`tick`](SetupCoordinator::tick) call:
//! each tick performs at most one non-blocking poll and returns control
//! immediately, so a host UI loop stays responsive between ticks.
//!
//! Observable side effects are emitted as [`SetupEvent`]s on a channel so a
//! UI can re-render without polling the coordinator itself.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{SetupTask, SharedTask, TaskResult};

/// One coordinated provisioning step
///
/// Entries are owned exclusively by the coordinator for the lifetime of a
/// session; callers interact through command methods and read-only
/// [`EntryStatus`] snapshots.
pub struct SetupEntry {
    name: String,
    task: SharedTask,
    prerequisite: Option<(String, SharedTask)>,
    website_url: String,
    skip: Option<Box<dyn Fn() -> bool + Send>>,
}

impl SetupEntry {
    pub fn new(name: impl Into<String>, task: SharedTask) -> Self {
        Self {
            name: name.into(),
            task,
            prerequisite: None,
            website_url: String::new(),
            skip: None,
        }
    }

    /// Gate this entry on another entry's task being ready
    pub fn with_prerequisite(mut self, name: impl Into<String>, task: SharedTask) -> Self {
        self.prerequisite = Some((name.into(), task));
        self
    }

    /// Project page offered to the user next to this entry
    pub fn with_website(mut self, url: impl Into<String>) -> Self {
        self.website_url = url.into();
        self
    }

    /// Skip this entry whenever the predicate holds
    pub fn with_skip(mut self, skip: impl Fn() -> bool + Send + 'static) -> Self {
        self.skip = Some(Box::new(skip));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn should_skip(&self) -> bool {
        self.skip.as_ref().map(|f| f()).unwrap_or(false)
    }

    fn is_ready(&self) -> bool {
        self.task.lock().expect("setup task lock").is_ready()
    }

    fn prerequisite_blocker(&self) -> Option<&str> {
        match &self.prerequisite {
            Some((name, task)) if !task.lock().expect("setup task lock").is_ready() => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    fn with_task<R>(&self, f: impl FnOnce(&mut dyn SetupTask) -> R) -> R {
        let mut task = self.task.lock().expect("setup task lock");
        f(&mut *task)
    }
}

/// Read-only snapshot of one entry's state
#[derive(Debug, Clone, PartialEq)]
pub struct EntryStatus {
    pub name: String,
    pub website_url: String,
    pub is_ready: bool,
    pub is_running: bool,
    pub progress: f32,
}

/// Notifications emitted by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    /// Something observable changed; consumers should re-query snapshots
    StateChanged,
    /// A task was started
    TaskStarted { name: String },
    /// Progress of the currently running task
    TaskProgress {
        name: String,
        progress: f32,
        detail: String,
    },
    /// A task completed successfully
    TaskCompleted { name: String },
    /// A task failed; the remaining sequence is halted
    TaskFailed { name: String, message: String },
    /// The sequence finished, was cancelled, or halted on failure
    SequenceFinished { phase: SetupPhase },
}

/// Lifecycle of the coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    /// No sequence armed
    Idle,
    /// A sequence or single task is being driven by ticks
    Running,
    /// All entries completed or were skipped
    Finished,
    /// The caller cancelled between poll ticks
    Cancelled,
    /// An entry failed; later entries were not started (fail-fast)
    Failed,
}

/// How the active run was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// `process_all`: advance through every remaining entry
    Sequence,
    /// `start_task`: run exactly one entry out of sequence
    Single,
}

/// Internal state of the active run
struct ActiveRun {
    index: usize,
    started: bool,
    mode: RunMode,
}

/// Drives an ordered list of setup entries to completion
///
/// Exactly one task is running at a time; entries are processed strictly
/// sequentially. A failed entry halts the remaining sequence because later
/// entries may depend on its outcome.
pub struct SetupCoordinator {
    entries: Vec<SetupEntry>,
    run: Option<ActiveRun>,
    phase: SetupPhase,
    cancel_requested: bool,
    events: Option<mpsc::UnboundedSender<SetupEvent>>,
}

impl SetupCoordinator {
    pub fn new(entries: Vec<SetupEntry>) -> Self {
        Self {
            entries,
            run: None,
            phase: SetupPhase::Idle,
            cancel_requested: false,
            events: None,
        }
    }

    /// Subscribe to coordinator events
    ///
    /// Only the most recent subscriber receives events; re-subscribing
    /// replaces the previous channel, so run restarts cannot leak stale
    /// subscriptions.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SetupEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Whether a sequence or single task is currently being driven
    pub fn is_processing(&self) -> bool {
        self.run.is_some()
    }

    /// Phase of the most recent run
    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    /// Read-only snapshots of every entry
    pub fn statuses(&self) -> Vec<EntryStatus> {
        self.entries
            .iter()
            .map(|entry| {
                let (is_ready, is_running, progress) = entry.with_task(|task| {
                    (task.is_ready(), task.is_running(), task.progress())
                });
                EntryStatus {
                    name: entry.name.clone(),
                    website_url: entry.website_url.clone(),
                    is_ready,
                    is_running,
                    progress,
                }
            })
            .collect()
    }

    /// Arm the full sequence; a no-op when a run is already active
    pub fn process_all(&mut self) {
        if self.run.is_some() {
            return;
        }
        info!("setup sequence armed with {} entries", self.entries.len());
        self.cancel_requested = false;
        self.phase = SetupPhase::Running;
        self.run = Some(ActiveRun {
            index: 0,
            started: false,
            mode: RunMode::Sequence,
        });
        self.emit(SetupEvent::StateChanged);
    }

    /// Arm a single entry out of sequence, subject to the same checks
    pub fn start_task(&mut self, name: &str) -> Result<(), crate::errors::SetupError> {
        use crate::errors::SetupError;

        if self.run.is_some() {
            return Err(SetupError::AlreadyRunning {
                entry: name.to_string(),
            });
        }
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| SetupError::EntryNotFound {
                name: name.to_string(),
            })?;

        if let Some(prerequisite) = self.entries[index].prerequisite_blocker() {
            return Err(SetupError::PrerequisiteNotReady {
                entry: name.to_string(),
                prerequisite: prerequisite.to_string(),
            });
        }

        self.cancel_requested = false;
        self.phase = SetupPhase::Running;
        self.run = Some(ActiveRun {
            index,
            started: false,
            mode: RunMode::Single,
        });
        self.emit(SetupEvent::StateChanged);
        Ok(())
    }

    /// Request cooperative cancellation, checked between poll ticks
    ///
    /// The currently running task is not killed; pair with
    /// [`abort_current`](Self::abort_current) for that.
    pub fn cancel_all(&mut self) {
        if self.run.is_some() {
            self.cancel_requested = true;
        }
    }

    /// Abort whichever task is currently running, releasing its resources
    pub fn abort_current(&mut self) {
        for entry in &self.entries {
            entry.with_task(|task| {
                if task.is_running() {
                    task.abort();
                }
            });
        }
    }

    /// Advance the state machine by one non-blocking step
    ///
    /// Performs at most one task start or one poll, emits the resulting
    /// events, and returns immediately.
    pub fn tick(&mut self) {
        let Some(run) = &mut self.run else {
            return;
        };

        if self.cancel_requested {
            info!("setup sequence cancelled");
            self.finish_run(SetupPhase::Cancelled);
            return;
        }

        let index = run.index;
        if !run.started {
            let entry = &self.entries[index];

            if entry.should_skip() || entry.is_ready() {
                debug!(entry = %entry.name, "skipping ready entry");
                self.advance();
                return;
            }

            if let Some(prerequisite) = entry.prerequisite_blocker() {
                let message = format!(
                    "Cannot start '{}': prerequisite '{}' is not ready.",
                    entry.name, prerequisite
                );
                warn!("{}", message);
                let name = entry.name.clone();
                self.emit(SetupEvent::TaskFailed { name, message });
                self.finish_run(SetupPhase::Failed);
                return;
            }

            let name = entry.name.clone();
            let result = entry.with_task(|task| task.start());
            match result {
                TaskResult::Failed { message } => {
                    warn!(entry = %name, %message, "task failed to start");
                    self.emit(SetupEvent::TaskFailed { name, message });
                    self.finish_run(SetupPhase::Failed);
                }
                TaskResult::Success => {
                    // Synchronous tasks (validation) can finish in start().
                    debug!(entry = %name, "task completed synchronously");
                    self.emit(SetupEvent::TaskCompleted { name });
                    self.advance();
                }
                TaskResult::InProgress { .. } => {
                    debug!(entry = %name, "task started");
                    if let Some(run) = &mut self.run {
                        run.started = true;
                    }
                    self.emit(SetupEvent::TaskStarted { name });
                    self.emit(SetupEvent::StateChanged);
                }
            }
            return;
        }

        // One poll per tick for the in-flight task.
        let entry = &self.entries[index];
        let name = entry.name.clone();
        let (result, progress) = entry.with_task(|task| (task.poll(), task.progress()));
        match result {
            TaskResult::InProgress { detail } => {
                self.emit(SetupEvent::TaskProgress {
                    name,
                    progress,
                    detail,
                });
                self.emit(SetupEvent::StateChanged);
            }
            TaskResult::Success => {
                info!(entry = %name, "task completed");
                self.emit(SetupEvent::TaskCompleted { name });
                self.advance();
            }
            TaskResult::Failed { message } => {
                warn!(entry = %name, %message, "task failed");
                self.emit(SetupEvent::TaskFailed { name, message });
                self.finish_run(SetupPhase::Failed);
            }
        }
    }

    /// Drive ticks until the active run finishes
    ///
    /// Convenience for non-UI callers; the state machine itself never
    /// blocks inside a tick.
    pub async fn run_to_completion(&mut self) -> SetupPhase {
        while self.is_processing() {
            self.tick();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.phase
    }

    fn advance(&mut self) {
        let Some(run) = &mut self.run else {
            return;
        };
        match run.mode {
            RunMode::Single => self.finish_run(SetupPhase::Finished),
            RunMode::Sequence => {
                run.index += 1;
                run.started = false;
                if run.index >= self.entries.len() {
                    self.finish_run(SetupPhase::Finished);
                } else {
                    self.emit(SetupEvent::StateChanged);
                }
            }
        }
    }

    fn finish_run(&mut self, phase: SetupPhase) {
        self.run = None;
        self.cancel_requested = false;
        self.phase = phase;
        self.emit(SetupEvent::SequenceFinished { phase });
        self.emit(SetupEvent::StateChanged);
    }

    fn emit(&self, event: SetupEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
