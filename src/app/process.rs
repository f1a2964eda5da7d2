//! Blender subprocess management
//!
//! Spawns the fitter core inside Blender with piped stdio and moves every
//! line of output into a shared FIFO that the orchestration tick drains.
//! Stderr lines are tagged so they stay distinguishable after merging.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::ProcessError;

/// Shared line FIFO between the reader tasks and the tick loop
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        self.lines.lock().expect("log sink poisoned").push_back(line);
    }

    /// Remove and return all queued lines, oldest first
    pub fn drain(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("log sink poisoned")
            .drain(..)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().expect("log sink poisoned").is_empty()
    }
}

/// A running fitter core invocation
///
/// Dropping the handle kills the child; readers shut down on their own when
/// the pipes close.
#[derive(Debug)]
pub struct FitterProcess {
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

impl FitterProcess {
    /// Spawn `program` with `args`, wiring stdout and stderr into `sink`
    pub fn spawn(program: &str, args: &[String], sink: LogSink) -> Result<Self, ProcessError> {
        debug!(program, arg_count = args.len(), "spawning fitter process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.into(),
                source,
            })?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, sink.clone(), None));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, sink, Some("ERROR: ")));
        }

        Ok(Self { child, readers })
    }

    /// Non-blocking exit check; `Some(success)` once the process is gone
    pub fn try_wait(&mut self) -> Result<Option<bool>, ProcessError> {
        match self.child.try_wait()? {
            Some(status) => Ok(Some(status.success())),
            None => Ok(None),
        }
    }

    /// Whether both reader tasks have drained their pipes
    ///
    /// Only meaningful once `try_wait` has reported an exit; the readers
    /// finish when the child's ends of the pipes close.
    pub fn output_flushed(&self) -> bool {
        self.readers.iter().all(|reader| reader.is_finished())
    }

    /// Forcibly terminate the child and stop the readers
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "failed to kill fitter process");
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }

    /// Wait for both reader tasks to finish flushing remaining output
    pub async fn flush_output(&mut self) {
        for reader in self.readers.drain(..) {
            let _ = reader.await;
        }
    }
}

fn spawn_reader<R>(stream: R, sink: LogSink, prefix: Option<&'static str>) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match prefix {
                Some(tag) => sink.push(format!("{}{}", tag, line)),
                None => sink.push(line),
            }
        }
    })
}
