//! Command handlers for the CLI
//!
//! Each handler wires the argument structs into the orchestration layer and
//! drives the tick loop until the run reaches a terminal state.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::app::command::{build_command_line, CoreArguments};
use crate::app::config::ConfigCatalog;
use crate::app::fitting::{FitterEnvironment, FittingRunner};
use crate::app::models::{BlendShapeEntry, FitState};
use crate::app::paths::ensure_output_dir;
use crate::app::progress::ExecutionState;
use crate::app::setup::{
    standard_entries, ComponentPaths, SetupCoordinator, SetupPhase, SystemArchiveExtractor,
};
use crate::cli::args::{FitArgs, GlobalArgs, SetupArgs};
use crate::cli::progress::{FitProgress, SetupProgress};
use crate::constants::{fitting, ticks};
use crate::errors::{AppError, FittingError, Result};

fn component_paths(global: &GlobalArgs) -> ComponentPaths {
    match &global.tools_dir {
        Some(dir) => ComponentPaths::new(dir.clone()),
        None => ComponentPaths::default_layout(),
    }
}

fn configs_dir(global: &GlobalArgs) -> PathBuf {
    global
        .configs_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(fitting::CONFIGS_DIR))
}

/// Provision the Blender toolchain
pub async fn handle_setup(global: &GlobalArgs, args: SetupArgs) -> Result<()> {
    let paths = component_paths(global);
    std::fs::create_dir_all(paths.tools_dir())?;

    let entries = standard_entries(&paths, Arc::new(SystemArchiveExtractor));
    let mut coordinator = SetupCoordinator::new(entries);

    if args.list {
        for status in coordinator.statuses() {
            let marker = if status.is_ready { "ready" } else { "pending" };
            println!("{:<35} {}", status.name, marker);
        }
        return Ok(());
    }

    let mut events = coordinator.subscribe();
    match &args.task {
        Some(name) => {
            info!(task = %name, "running single setup step");
            coordinator.start_task(name)?;
        }
        None => {
            info!("running full setup sequence");
            coordinator.process_all();
        }
    }

    let mut display = SetupProgress::new(global.quiet);
    while coordinator.is_processing() {
        coordinator.tick();
        while let Ok(event) = events.try_recv() {
            display.handle(&event);
        }
        tokio::time::sleep(ticks::TICK_INTERVAL).await;
    }
    while let Ok(event) = events.try_recv() {
        display.handle(&event);
    }

    match coordinator.phase() {
        SetupPhase::Finished => Ok(()),
        SetupPhase::Cancelled => Err(AppError::generic("Setup was cancelled")),
        _ => Err(AppError::generic(
            display.failure().unwrap_or("Setup failed"),
        )),
    }
}

/// Show toolchain readiness
pub async fn handle_status(global: &GlobalArgs) -> Result<()> {
    let paths = component_paths(global);
    let entries = standard_entries(&paths, Arc::new(SystemArchiveExtractor));
    let coordinator = SetupCoordinator::new(entries);

    println!("Toolchain directory: {}", paths.tools_dir().display());
    for status in coordinator.statuses() {
        let marker = if status.is_ready { "✓" } else { "✗" };
        println!("  {} {}", marker, status.name);
    }

    match paths.blender_executable() {
        Some(exe) => println!("Blender executable: {}", exe.display()),
        None => println!("Blender executable: not found (run `avatar_fitter setup`)"),
    }
    match paths.core_script() {
        Some(script) => println!("Core script: {}", script.display()),
        None => println!("Core script: not found (run `avatar_fitter setup`)"),
    }
    Ok(())
}

/// List available fitting configurations
pub async fn handle_configs(global: &GlobalArgs) -> Result<()> {
    let dir = configs_dir(global);
    let catalog = ConfigCatalog::load_dir(&dir)?;

    if catalog.is_empty() {
        println!("No configurations found in {}", dir.display());
        return Ok(());
    }
    for config in catalog.configs() {
        println!(
            "{:<30} {} → {}  ({})",
            config.display_name,
            config.clothing_avatar.name,
            config.base_avatar.name,
            config.config_path
        );
    }
    Ok(())
}

/// Run a fitting pipeline
pub async fn handle_fit(global: &GlobalArgs, args: FitArgs) -> Result<()> {
    let paths = component_paths(global);
    let catalog = ConfigCatalog::load_dir(&configs_dir(global))?;

    let state = fit_state_from_args(&args, &catalog)?;

    let script_path = paths
        .core_script()
        .ok_or_else(|| AppError::generic(
            "Fitter core script not found. Run `avatar_fitter setup` first.",
        ))?;
    let base_scene_path = paths
        .base_scene()
        .unwrap_or_else(|| paths.core_dir().join(fitting::DEFAULT_BASE_SCENE));

    if args.print_command {
        return print_command(&state, &catalog, &script_path, &base_scene_path);
    }

    let executable = paths.blender_executable().ok_or_else(|| AppError::generic(
        "Blender executable not found. Run `avatar_fitter setup` first.",
    ))?;
    let output_dir = match &args.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => ensure_output_dir(&std::env::current_dir()?)?,
    };

    let environment = FitterEnvironment {
        executable,
        script_path,
        base_scene_path,
        output_dir,
    };
    let mut runner = FittingRunner::new(environment, catalog.configs().to_vec());
    let mut events = runner.subscribe();
    let mut display = FitProgress::new(global.quiet);

    runner.execute(state)?;
    while runner.is_fitting() {
        runner.tick()?;
        while let Ok(event) = events.try_recv() {
            display.handle(&event);
        }
        tokio::time::sleep(ticks::TICK_INTERVAL).await;
    }
    while let Ok(event) = events.try_recv() {
        display.handle(&event);
    }

    let summary = runner.last_run_summary().unwrap_or("").to_string();
    display.finish(&summary);
    match runner.execution_state() {
        ExecutionState::Completed => {
            if let Some(output) = runner.last_output_path() {
                println!("Output written to {}", output.display());
            }
            Ok(())
        }
        _ => Err(AppError::generic(summary)),
    }
}

fn print_command(
    state: &FitState,
    catalog: &ConfigCatalog,
    script_path: &std::path::Path,
    base_scene_path: &std::path::Path,
) -> Result<()> {
    let config = catalog
        .by_path(&state.source_config_path)
        .or_else(|| catalog.by_path(&state.target_config_path))
        .ok_or_else(|| FittingError::ConfigNotFound {
            path: state.source_config_path.clone(),
        })?;

    let mut core_args = CoreArguments::from_state(
        state,
        config,
        &script_path.display().to_string(),
        &base_scene_path.display().to_string(),
    );
    core_args.blend_shape_entries = state.blend_shape_entries.clone();
    println!("{}", build_command_line(&core_args)?);
    Ok(())
}

/// Resolve CLI flags into the per-run state, mapping names to config paths
fn fit_state_from_args(args: &FitArgs, catalog: &ConfigCatalog) -> Result<FitState> {
    let source_config_path = resolve_config(args.source.as_deref(), catalog)?;
    let target_config_path = resolve_config(args.target.as_deref(), catalog)?;
    if source_config_path.is_empty() && target_config_path.is_empty() {
        return Err(AppError::generic(
            "Specify at least one of --source or --target",
        ));
    }

    Ok(FitState {
        input_path: args
            .input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        source_config_path,
        target_config_path,
        hips_override: args.hips_position.clone().unwrap_or_default(),
        blend_shape_entries: parse_blend_shapes(&args.blend_shapes)?,
        blend_shape_mappings: args.mappings.clone(),
        target_meshes: args.target_meshes.clone(),
        mesh_renderers: args.mesh_renderers.clone(),
        name_conversions: args.name_conversions.clone(),
        preserve_bone_names: args.preserve_bone_names,
        subdivide: !args.no_subdivision,
        triangulate: !args.no_triangle,
    })
}

fn resolve_config(selector: Option<&str>, catalog: &ConfigCatalog) -> Result<String> {
    let Some(selector) = selector else {
        return Ok(String::new());
    };
    let config = catalog
        .by_path(selector)
        .or_else(|| catalog.by_name(selector))
        .ok_or_else(|| FittingError::ConfigNotFound {
            path: selector.to_string(),
        })?;
    Ok(config.config_path.clone())
}

/// Parse repeated `NAME=VALUE` blend-shape overrides
fn parse_blend_shapes(raw: &[String]) -> Result<Vec<BlendShapeEntry>> {
    raw.iter()
        .map(|item| {
            let (name, value) = item.split_once('=').ok_or_else(|| {
                AppError::generic(format!(
                    "Invalid blend shape '{}': expected NAME=VALUE",
                    item
                ))
            })?;
            let value: f32 = value.trim().parse().map_err(|_| {
                AppError::generic(format!("Invalid blend shape value in '{}'", item))
            })?;
            Ok(BlendShapeEntry {
                enabled: true,
                original_name: name.trim().to_string(),
                custom_name: name.trim().to_string(),
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blend_shapes() {
        let entries = parse_blend_shapes(&["Breast=55".to_string(), "Hips = 100.5".to_string()])
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].custom_name, "Breast");
        assert_eq!(entries[0].value, 55.0);
        assert_eq!(entries[1].custom_name, "Hips");
        assert_eq!(entries[1].value, 100.5);

        assert!(parse_blend_shapes(&["no-equals".to_string()]).is_err());
        assert!(parse_blend_shapes(&["Breast=abc".to_string()]).is_err());
    }

    #[test]
    fn test_fit_state_requires_a_config() {
        let catalog = ConfigCatalog::default();
        let args = FitArgs {
            input: None,
            source: None,
            target: None,
            output_dir: None,
            hips_position: None,
            blend_shapes: Vec::new(),
            mappings: Vec::new(),
            target_meshes: Vec::new(),
            mesh_renderers: Vec::new(),
            name_conversions: Vec::new(),
            preserve_bone_names: false,
            no_subdivision: false,
            no_triangle: false,
            print_command: false,
        };
        assert!(fit_state_from_args(&args, &catalog).is_err());
    }

    #[test]
    fn test_negating_flags_invert_into_state() {
        let tmp = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "display_name": "Pair",
            "base_avatar": { "name": "Astra" },
            "clothing_avatar": { "name": "Coat" },
        });
        std::fs::write(tmp.path().join("pair.json"), body.to_string()).unwrap();
        let catalog = ConfigCatalog::load_dir(tmp.path()).unwrap();

        let args = FitArgs {
            input: None,
            source: Some("Pair".to_string()),
            target: None,
            output_dir: None,
            hips_position: None,
            blend_shapes: Vec::new(),
            mappings: Vec::new(),
            target_meshes: Vec::new(),
            mesh_renderers: Vec::new(),
            name_conversions: Vec::new(),
            preserve_bone_names: false,
            no_subdivision: true,
            no_triangle: false,
            print_command: false,
        };
        let state = fit_state_from_args(&args, &catalog).unwrap();
        assert!(!state.subdivide);
        assert!(state.triangulate);
        assert!(state.source_config_path.ends_with("pair.json"));
    }

    #[test]
    fn test_resolve_config_by_name_or_path() {
        let catalog = ConfigCatalog::default();
        assert!(resolve_config(Some("missing"), &catalog).is_err());
        assert_eq!(resolve_config(None, &catalog).unwrap(), "");
    }
}
