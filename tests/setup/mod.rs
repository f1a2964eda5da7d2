//! Integration tests for the setup coordinator
//!
//! These tests verify the end-to-end provisioning flow: prerequisite gating,
//! skip-when-ready behavior, and the durable install marker, using real
//! tasks against a temporary toolchain directory.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use avatar_fitter::app::setup::{
    shared, ArchiveExtractor, DownloadTask, InstallTask, SetupCoordinator, SetupEntry, SetupEvent,
    SetupPhase, ValidationTask,
};
use avatar_fitter::errors::SetupTaskResult;

/// Extractor that records invocations and fakes extraction by creating
/// the destination directory with one file inside
#[derive(Default)]
struct CountingExtractor {
    calls: AtomicUsize,
}

impl ArchiveExtractor for CountingExtractor {
    fn extract(&self, _archive: &Path, dest: &Path) -> SetupTaskResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("payload.py"), "# extracted")?;
        Ok(())
    }
}

/// Two ready downloads and one pending install: only the install runs,
/// and afterwards all three entries report ready.
#[tokio::test]
async fn test_sequence_starts_only_the_pending_install() {
    let temp_dir = TempDir::new().unwrap();
    let blender_archive = temp_dir.path().join("blender.zip");
    let core_archive = temp_dir.path().join("core.zip");
    std::fs::write(&blender_archive, b"archive").unwrap();
    std::fs::write(&core_archive, b"archive").unwrap();

    let extractor = Arc::new(CountingExtractor::default());

    // Download readiness is judged by the artifact already being on disk;
    // the URLs are never contacted.
    let blender_download = shared(DownloadTask::new(
        "Blender download",
        "http://unused.invalid/blender.zip",
        blender_archive,
    ));
    let core_download = shared(DownloadTask::new(
        "Core download",
        "http://unused.invalid/core.zip",
        core_archive.clone(),
    ));
    let core_install = shared(InstallTask::new(
        "Core install",
        core_archive,
        temp_dir.path().join("core"),
        "v1",
        extractor.clone(),
    ));

    let mut coordinator = SetupCoordinator::new(vec![
        SetupEntry::new("Blender download", blender_download),
        SetupEntry::new("Core download", core_download.clone()),
        SetupEntry::new("Core install", core_install)
            .with_prerequisite("Core download", core_download),
    ]);
    let mut events = coordinator.subscribe();

    coordinator.process_all();
    let phase = coordinator.run_to_completion().await;

    assert_eq!(phase, SetupPhase::Finished);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    for status in coordinator.statuses() {
        assert!(status.is_ready, "{} should be ready", status.name);
        assert!(!status.is_running);
    }

    // Only the install task was ever started.
    let mut started = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SetupEvent::TaskStarted { name } = event {
            started.push(name);
        }
    }
    assert_eq!(started, vec!["Core install".to_string()]);
}

/// Re-running the sequence after a successful install does nothing:
/// the durable marker keeps every entry ready.
#[tokio::test]
async fn test_rerun_is_idempotent_via_install_marker() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("core.zip");
    std::fs::write(&archive, b"archive").unwrap();
    let extractor = Arc::new(CountingExtractor::default());

    let install = shared(InstallTask::new(
        "Core install",
        archive.clone(),
        temp_dir.path().join("core"),
        "v1",
        extractor.clone(),
    ));

    let mut coordinator =
        SetupCoordinator::new(vec![SetupEntry::new("Core install", install.clone())]);
    coordinator.process_all();
    assert_eq!(coordinator.run_to_completion().await, SetupPhase::Finished);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    // Second pass sees the marker and never extracts again.
    let mut coordinator = SetupCoordinator::new(vec![SetupEntry::new("Core install", install)]);
    coordinator.process_all();
    assert_eq!(coordinator.run_to_completion().await, SetupPhase::Finished);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

/// An install whose archive was never downloaded fails fast and halts
/// the sequence before later entries run.
#[tokio::test]
async fn test_missing_archive_halts_sequence() {
    let temp_dir = TempDir::new().unwrap();
    let extractor = Arc::new(CountingExtractor::default());

    let install = shared(InstallTask::new(
        "Core install",
        temp_dir.path().join("never-downloaded.zip"),
        temp_dir.path().join("core"),
        "v1",
        extractor.clone(),
    ));
    let validation = shared(ValidationTask::new(vec![(
        "Fitter core".to_string(),
        install.clone(),
    )]));

    let mut coordinator = SetupCoordinator::new(vec![
        SetupEntry::new("Core install", install),
        SetupEntry::new("Environment validation", validation),
    ]);
    let mut events = coordinator.subscribe();

    coordinator.process_all();
    assert_eq!(coordinator.run_to_completion().await, SetupPhase::Failed);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SetupEvent::TaskFailed { name, .. } = event {
            failed.push(name);
        }
    }
    assert_eq!(failed, vec!["Core install".to_string()]);
}

/// Validation aggregates readiness of the installs it references.
#[tokio::test]
async fn test_validation_passes_once_installs_are_ready() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("core.zip");
    std::fs::write(&archive, b"archive").unwrap();
    let extractor = Arc::new(CountingExtractor::default());

    let install = shared(InstallTask::new(
        "Core install",
        archive,
        temp_dir.path().join("core"),
        "v1",
        extractor,
    ));
    let validation = shared(ValidationTask::new(vec![(
        "Fitter core".to_string(),
        install.clone(),
    )]));

    let mut coordinator = SetupCoordinator::new(vec![
        SetupEntry::new("Core install", install),
        SetupEntry::new("Environment validation", validation),
    ]);

    coordinator.process_all();
    assert_eq!(coordinator.run_to_completion().await, SetupPhase::Finished);
    assert!(coordinator.statuses().iter().all(|s| s.is_ready));
}
