//! Provisioning task implementations
//!
//! Three task variants cover the setup pipeline: [`DownloadTask`] streams a
//! component archive to disk, [`InstallTask`] extracts it and writes a
//! durable completion marker, and [`ValidationTask`] aggregates the
//! readiness of other tasks without side effects.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::tools;
use crate::errors::{SetupError, SetupTaskResult};

use super::{SetupTask, SharedTask, TaskResult};

/// Shared observation point between a transfer task and the tick loop
#[derive(Debug, Default)]
struct TransferState {
    bytes: AtomicU64,
    total: AtomicU64,
    outcome: Mutex<Option<Result<(), String>>>,
}

impl TransferState {
    fn finish(&self, result: Result<(), String>) {
        *self.outcome.lock().expect("transfer outcome lock") = Some(result);
    }

    fn outcome(&self) -> Option<Result<(), String>> {
        self.outcome.lock().expect("transfer outcome lock").clone()
    }

    fn fraction(&self) -> f32 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        (self.bytes.load(Ordering::Relaxed) as f32 / total as f32).clamp(0.0, 1.0)
    }
}

/// Streams a component archive from a URL to a target path
///
/// The transfer writes to `<target>.part` and renames atomically on
/// completion, so `is_ready` (target file existence) never observes a
/// half-written archive. Aborting cancels the transfer task and deletes
/// the partial file.
pub struct DownloadTask {
    name: String,
    url: String,
    target_path: PathBuf,
    client: reqwest::Client,
    state: Option<Arc<TransferState>>,
    handle: Option<JoinHandle<()>>,
}

impl DownloadTask {
    pub fn new(name: impl Into<String>, url: impl Into<String>, target_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            target_path,
            client: reqwest::Client::new(),
            state: None,
            handle: None,
        }
    }

    fn part_path(&self) -> PathBuf {
        let mut p = self.target_path.as_os_str().to_owned();
        p.push(".part");
        PathBuf::from(p)
    }

    fn clear(&mut self) {
        self.state = None;
        self.handle = None;
    }

    async fn transfer(
        client: reqwest::Client,
        url: String,
        part_path: PathBuf,
        target_path: PathBuf,
        state: Arc<TransferState>,
    ) -> SetupTaskResult<()> {
        let response = client.get(&url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            state.total.store(len, Ordering::Relaxed);
        }

        let mut file = tokio::fs::File::create(&part_path).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            state.bytes.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part_path, &target_path).await?;
        Ok(())
    }
}

impl SetupTask for DownloadTask {
    fn is_running(&self) -> bool {
        self.state.is_some()
    }

    fn is_ready(&self) -> bool {
        self.target_path.exists()
    }

    fn progress(&self) -> f32 {
        self.state.as_ref().map(|s| s.fraction()).unwrap_or(0.0)
    }

    fn start(&mut self) -> TaskResult {
        if self.is_ready() {
            return TaskResult::Success;
        }
        if self.state.is_some() {
            return TaskResult::failed("Download is in progress. Please wait for it to finish.");
        }
        if let Err(e) = url::Url::parse(&self.url) {
            return TaskResult::failed(format!("invalid download URL {}: {}", self.url, e));
        }

        if let Some(parent) = self.target_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return TaskResult::failed(format!("cannot create download folder: {}", e));
            }
        }

        debug!(task = %self.name, url = %self.url, "starting download");
        let state = Arc::new(TransferState::default());
        let task_state = state.clone();
        let client = self.client.clone();
        let url = self.url.clone();
        let part = self.part_path();
        let target = self.target_path.clone();

        self.handle = Some(tokio::spawn(async move {
            let result = Self::transfer(client, url, part, target, task_state.clone()).await;
            task_state.finish(result.map_err(|e| e.to_string()));
        }));
        self.state = Some(state);

        TaskResult::in_progress(self.file_label())
    }

    fn poll(&mut self) -> TaskResult {
        let Some(state) = &self.state else {
            return TaskResult::failed("Download not started.");
        };

        match state.outcome() {
            None => TaskResult::in_progress(self.file_label()),
            Some(Ok(())) => {
                debug!(task = %self.name, "download complete");
                self.clear();
                TaskResult::Success
            }
            Some(Err(message)) => {
                warn!(task = %self.name, %message, "download failed");
                self.clear();
                TaskResult::failed(format!("{} download failed: {}", self.name, message))
            }
        }
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        if self.state.take().is_some() {
            let part = self.part_path();
            if part.exists() {
                let _ = std::fs::remove_file(&part);
            }
            debug!(task = %self.name, "download aborted, partial file removed");
        }
    }
}

impl DownloadTask {
    fn file_label(&self) -> String {
        self.target_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Extracts a component archive into its install directory
///
/// The extraction mechanics are an external collaborator; implementations
/// run on a blocking thread.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path) -> SetupTaskResult<()>;
}

/// Extractor shelling out to the platform archive tools
///
/// Dispatches on extension: `unzip` for zip archives, `tar` otherwise.
pub struct SystemArchiveExtractor;

impl ArchiveExtractor for SystemArchiveExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> SetupTaskResult<()> {
        std::fs::create_dir_all(dest)?;
        let is_zip = archive
            .extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        let status = if is_zip {
            Command::new("unzip")
                .arg("-o")
                .arg(archive)
                .arg("-d")
                .arg(dest)
                .status()
        } else {
            Command::new("tar")
                .arg("-xf")
                .arg(archive)
                .arg("-C")
                .arg(dest)
                .status()
        }?;

        if status.success() {
            Ok(())
        } else {
            Err(SetupError::ExtractionFailed {
                reason: format!("extractor exited with {}", status),
            })
        }
    }
}

/// Installs a downloaded archive and records completion durably
///
/// `is_ready` is judged by the `.install-complete` marker inside the
/// install directory rather than by extracted file existence, so a
/// half-finished extraction is re-runnable and a finished one detectable.
pub struct InstallTask {
    name: String,
    archive_path: PathBuf,
    install_dir: PathBuf,
    version_tag: String,
    extractor: Arc<dyn ArchiveExtractor>,
    outcome: Option<Arc<Mutex<Option<Result<(), String>>>>>,
    handle: Option<JoinHandle<()>>,
}

impl InstallTask {
    pub fn new(
        name: impl Into<String>,
        archive_path: PathBuf,
        install_dir: PathBuf,
        version_tag: impl Into<String>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            name: name.into(),
            archive_path,
            install_dir,
            version_tag: version_tag.into(),
            extractor,
            outcome: None,
            handle: None,
        }
    }

    /// Path of the durable completion marker
    pub fn marker_path(&self) -> PathBuf {
        self.install_dir.join(tools::INSTALL_MARKER)
    }
}

impl SetupTask for InstallTask {
    fn is_running(&self) -> bool {
        self.outcome.is_some()
    }

    fn is_ready(&self) -> bool {
        self.marker_path().exists()
    }

    fn progress(&self) -> f32 {
        if self.is_ready() {
            1.0
        } else if self.is_running() {
            0.5
        } else {
            0.0
        }
    }

    fn start(&mut self) -> TaskResult {
        if self.is_ready() {
            return TaskResult::Success;
        }
        if self.outcome.is_some() {
            return TaskResult::failed("Installation is already in progress.");
        }
        if !self.archive_path.exists() {
            return TaskResult::failed(format!(
                "{} archive not found: {}. Download it first.",
                self.name,
                self.archive_path.display()
            ));
        }

        debug!(task = %self.name, dir = %self.install_dir.display(), "starting install");
        let outcome = Arc::new(Mutex::new(None));
        let task_outcome = outcome.clone();
        let extractor = self.extractor.clone();
        let archive = self.archive_path.clone();
        let dest = self.install_dir.clone();
        let marker = self.marker_path();
        let tag = self.version_tag.clone();

        self.handle = Some(tokio::task::spawn_blocking(move || {
            let result = extractor
                .extract(&archive, &dest)
                .map_err(|e| e.to_string())
                .and_then(|()| std::fs::write(&marker, &tag).map_err(|e| e.to_string()));
            *task_outcome.lock().expect("install outcome lock") = Some(result);
        }));
        self.outcome = Some(outcome);

        TaskResult::in_progress(format!("Installing {}...", self.name))
    }

    fn poll(&mut self) -> TaskResult {
        let Some(outcome) = &self.outcome else {
            return TaskResult::failed("Installation not started.");
        };

        let current = outcome.lock().expect("install outcome lock").clone();
        match current {
            None => TaskResult::in_progress(format!("Installing {}...", self.name)),
            Some(Ok(())) => {
                debug!(task = %self.name, "install complete");
                self.outcome = None;
                self.handle = None;
                TaskResult::Success
            }
            Some(Err(message)) => {
                warn!(task = %self.name, %message, "install failed");
                self.outcome = None;
                self.handle = None;
                TaskResult::failed(format!("{} installation failed: {}", self.name, message))
            }
        }
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.outcome = None;
    }
}

/// Aggregates the readiness of several other tasks without side effects
pub struct ValidationTask {
    checks: Vec<(String, SharedTask)>,
    last_result: Option<TaskResult>,
}

impl ValidationTask {
    pub fn new(checks: Vec<(String, SharedTask)>) -> Self {
        Self {
            checks,
            last_result: None,
        }
    }

    fn validate(&self) -> TaskResult {
        for (name, task) in &self.checks {
            if !task.lock().expect("validation task lock").is_ready() {
                return TaskResult::failed(format!(
                    "{} is not ready. Please set it up first.",
                    name
                ));
            }
        }
        TaskResult::Success
    }
}

impl SetupTask for ValidationTask {
    fn is_running(&self) -> bool {
        false
    }

    fn is_ready(&self) -> bool {
        self.checks
            .iter()
            .all(|(_, task)| task.lock().expect("validation task lock").is_ready())
    }

    fn progress(&self) -> f32 {
        if self.is_ready() {
            1.0
        } else {
            0.0
        }
    }

    fn start(&mut self) -> TaskResult {
        let result = self.validate();
        self.last_result = Some(result.clone());
        result
    }

    fn poll(&mut self) -> TaskResult {
        self.last_result.clone().unwrap_or(TaskResult::Success)
    }

    fn abort(&mut self) {}
}
