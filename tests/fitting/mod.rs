//! Integration tests for the fitting pipeline
//!
//! These tests run the whole path from configuration discovery through the
//! runner and a fake Blender subprocess to the output artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tempfile::TempDir;

use avatar_fitter::app::config::ConfigCatalog;
use avatar_fitter::app::fitting::{FitEvent, FitterEnvironment, FittingRunner};
use avatar_fitter::app::models::FitState;
use avatar_fitter::app::progress::ExecutionState;
use avatar_fitter::errors::FittingError;

/// Fake Blender: a shell script that emits status lines and writes the
/// file named by the argument following `--output`
fn fake_blender(dir: &Path) -> anyhow::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-blender");
    let script = r#"#!/bin/sh
echo "Status: [fit] (1/4) importing"
echo "Status: [fit] (4/4) exporting"
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then echo fbx > "$arg"; fi
  prev="$arg"
done
"#;
    std::fs::write(&path, script)?;
    let mut perms = std::fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms)?;
    Ok(path)
}

fn write_config(
    dir: &Path,
    file: &str,
    display: &str,
    base: &str,
    clothing: &str,
) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "display_name": display,
        "base_avatar": {
            "name": base,
            "default_mesh_path": dir.join("base.fbx").display().to_string(),
        },
        "clothing_avatar": {
            "name": clothing,
            "default_mesh_path": dir.join("clothing.fbx").display().to_string(),
        },
        "init_pose_path": dir.join("init.json").display().to_string(),
    });
    std::fs::write(dir.join(file), body.to_string())?;
    Ok(())
}

fn environment(dir: &Path) -> anyhow::Result<FitterEnvironment> {
    Ok(FitterEnvironment {
        executable: fake_blender(dir)?,
        script_path: dir.join("core.py"),
        base_scene_path: dir.join("base.blend"),
        output_dir: dir.to_path_buf(),
    })
}

#[tokio::test]
async fn test_catalog_to_output_single_step() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    write_config(temp_dir.path(), "pair.json", "Pair", "Astra", "Coat")?;
    let catalog = ConfigCatalog::load_dir(temp_dir.path())?;
    let config_path = catalog.configs()[0].config_path.clone();

    let mut runner =
        FittingRunner::new(environment(temp_dir.path())?, catalog.configs().to_vec());
    let mut events = runner.subscribe();

    runner.execute(FitState {
        source_config_path: config_path,
        ..Default::default()
    })?;

    tokio::time::timeout(Duration::from_secs(10), runner.run_to_completion()).await??;

    assert_eq!(runner.execution_state(), ExecutionState::Completed);
    let output = runner
        .last_output_path()
        .context("run produced no output path")?;
    assert!(output.is_file());
    assert!(output
        .file_name()
        .context("output path has no file name")?
        .to_string_lossy()
        .starts_with("Coat_to_Astra_"));

    // Progress derived from the status lines reached 100%.
    let mut last_progress = -1.0f32;
    while let Ok(event) = events.try_recv() {
        if let FitEvent::Progress { overall, .. } = event {
            assert!(overall >= last_progress);
            last_progress = overall;
        }
    }
    assert_eq!(last_progress, 1.0);
    Ok(())
}

#[tokio::test]
async fn test_template_pair_selects_two_steps() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    write_config(temp_dir.path(), "source.json", "Source", "Template", "Coat")?;
    write_config(temp_dir.path(), "target.json", "Target", "Astra", "Template")?;
    let catalog = ConfigCatalog::load_dir(temp_dir.path())?;
    let source_path = catalog
        .by_name("Source")
        .context("source config missing")?
        .config_path
        .clone();
    let target_path = catalog
        .by_name("Target")
        .context("target config missing")?
        .config_path
        .clone();

    let mut runner =
        FittingRunner::new(environment(temp_dir.path())?, catalog.configs().to_vec());
    let mut events = runner.subscribe();

    runner.execute(FitState {
        source_config_path: source_path,
        target_config_path: target_path,
        ..Default::default()
    })?;

    tokio::time::timeout(Duration::from_secs(10), runner.run_to_completion()).await??;

    assert_eq!(runner.execution_state(), ExecutionState::Completed);
    assert!(runner
        .last_output_path()
        .context("run produced no output path")?
        .is_file());

    let mut steps = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let FitEvent::StepChanged { current, total } = event {
            steps.push((current, total));
        }
    }
    assert_eq!(steps, vec![(1, 2), (2, 2)]);
    Ok(())
}

#[tokio::test]
async fn test_only_one_run_per_runner() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    write_config(temp_dir.path(), "pair.json", "Pair", "Astra", "Coat")?;
    let catalog = ConfigCatalog::load_dir(temp_dir.path())?;
    let config_path = catalog.configs()[0].config_path.clone();

    let mut runner =
        FittingRunner::new(environment(temp_dir.path())?, catalog.configs().to_vec());
    let state = FitState {
        source_config_path: config_path,
        ..Default::default()
    };

    runner.execute(state.clone())?;
    assert!(matches!(
        runner.execute(state),
        Err(FittingError::AlreadyRunning)
    ));
    runner.cancel().await;
    Ok(())
}
