//! Fitting strategies
//!
//! A strategy decides the shape of one fitting run: how many subprocess
//! invocations it takes and what arguments each one gets. Strategies never
//! touch the process themselves; they return [`StrategyAction`] commands for
//! the runner to execute, which keeps the control flow in one place.

use std::path::{Path, PathBuf};

use crate::app::command::CoreArguments;
use crate::app::models::{find_config, BlendShapeEntry, ConfigInfo, FitState};
use crate::app::paths::{output_file_name, sanitize};
use crate::constants::fitting;

/// Read-only inputs a strategy draws from when assembling arguments
#[derive(Debug)]
pub struct StrategyContext<'a> {
    pub state: &'a FitState,
    pub configs: &'a [ConfigInfo],
    pub script_path: &'a str,
    pub base_scene_path: &'a str,
    pub output_dir: &'a Path,
}

/// What the runner should do next, as decided by the strategy
#[derive(Debug)]
pub enum StrategyAction {
    /// Launch one subprocess with these arguments
    Launch { args: CoreArguments, status: String },
    /// The run is over; report the outcome
    Finish { success: bool, summary: String },
}

/// The shape of one fitting run
pub trait FitStrategy: Send {
    /// 1-based index of the step currently running (or about to run)
    fn current_step(&self) -> u32;

    fn total_steps(&self) -> u32;

    /// Produce the first action of the run
    fn start(&mut self, ctx: &StrategyContext<'_>) -> StrategyAction;

    /// React to the active subprocess exiting
    fn on_process_exited(&mut self, success: bool, ctx: &StrategyContext<'_>) -> StrategyAction;

    /// Path of the final artifact, once the run has produced one
    fn final_output(&self) -> Option<&Path>;

    /// Combined progress across all steps given the active step's fraction
    fn overall_progress(&self, step_fraction: f32) -> f32 {
        let completed = self.current_step().saturating_sub(1) as f32;
        (completed + step_fraction.clamp(0.0, 1.0)) / self.total_steps() as f32
    }
}

fn config_embedded_entries(settings: &[crate::app::models::BlendShapeSetting]) -> Vec<BlendShapeEntry> {
    settings
        .iter()
        .map(|s| BlendShapeEntry {
            enabled: true,
            original_name: s.name.clone(),
            custom_name: s.name.clone(),
            value: s.value,
        })
        .collect()
}

fn missing_config(path: &str) -> StrategyAction {
    StrategyAction::Finish {
        success: false,
        summary: format!("Failed: configuration not found: {}", path),
    }
}

/// One subprocess, one output
///
/// Uses the source configuration when resolved, otherwise the target, and
/// applies the user's blend-shape overrides directly.
#[derive(Debug, Default)]
pub struct SingleStepStrategy {
    output_path: Option<PathBuf>,
}

impl SingleStepStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FitStrategy for SingleStepStrategy {
    fn current_step(&self) -> u32 {
        1
    }

    fn total_steps(&self) -> u32 {
        1
    }

    fn start(&mut self, ctx: &StrategyContext<'_>) -> StrategyAction {
        let config = find_config(ctx.configs, &ctx.state.source_config_path)
            .or_else(|| find_config(ctx.configs, &ctx.state.target_config_path));
        let Some(config) = config else {
            return missing_config(&ctx.state.source_config_path);
        };

        let output = ctx.output_dir.join(output_file_name(
            &config.clothing_avatar.name,
            &config.base_avatar.name,
        ));

        let mut args =
            CoreArguments::from_state(ctx.state, config, ctx.script_path, ctx.base_scene_path);
        args.output_path = output.display().to_string();
        args.blend_shape_entries = ctx.state.blend_shape_entries.clone();
        self.output_path = Some(output);

        StrategyAction::Launch {
            args,
            status: format!(
                "Fitting {} onto {}",
                config.clothing_avatar.name, config.base_avatar.name
            ),
        }
    }

    fn on_process_exited(&mut self, success: bool, _ctx: &StrategyContext<'_>) -> StrategyAction {
        if success {
            StrategyAction::Finish {
                success: true,
                summary: fitting::SUMMARY_SUCCESS.to_string(),
            }
        } else {
            self.output_path = None;
            StrategyAction::Finish {
                success: false,
                summary: fitting::SUMMARY_EXIT_ERROR.to_string(),
            }
        }
    }

    fn final_output(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }
}

/// Two chained subprocesses through the template intermediate
///
/// Step 1 fits the source clothing onto the template with the source
/// configuration's own embedded blend-shape settings and post-processing off;
/// step 2 consumes step 1's output as input under the target configuration
/// with the user's overrides applied.
#[derive(Debug, Default)]
pub struct ContinuousStrategy {
    step: u32,
    intermediate_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
}

impl ContinuousStrategy {
    pub fn new() -> Self {
        Self { step: 1, ..Default::default() }
    }

    fn launch_step_two(&mut self, ctx: &StrategyContext<'_>) -> StrategyAction {
        let Some(target) = find_config(ctx.configs, &ctx.state.target_config_path) else {
            return missing_config(&ctx.state.target_config_path);
        };
        let source = find_config(ctx.configs, &ctx.state.source_config_path);

        // Step transitions never start until the prior exit code is read,
        // so the intermediate should exist by now; a missing file is terminal.
        let intermediate = match &self.intermediate_path {
            Some(p) if p.is_file() => p.clone(),
            Some(p) => {
                return StrategyAction::Finish {
                    success: false,
                    summary: format!("Failed: step 1 output file not found: {}", p.display()),
                }
            }
            None => {
                return StrategyAction::Finish {
                    success: false,
                    summary: "Failed: step 1 produced no output path".to_string(),
                }
            }
        };

        self.step = 2;
        let source_name = source
            .map(|c| c.display_name.as_str())
            .unwrap_or("source");
        let output = ctx
            .output_dir
            .join(output_file_name(source_name, &target.display_name));

        let mut args =
            CoreArguments::from_state(ctx.state, target, ctx.script_path, ctx.base_scene_path);
        args.input_path = intermediate.display().to_string();
        args.output_path = output.display().to_string();
        args.blend_shape_entries = ctx.state.blend_shape_entries.clone();
        self.output_path = Some(output);

        StrategyAction::Launch {
            args,
            status: format!("Step 2/2: fitting onto {}", target.base_avatar.name),
        }
    }
}

impl FitStrategy for ContinuousStrategy {
    fn current_step(&self) -> u32 {
        self.step.max(1)
    }

    fn total_steps(&self) -> u32 {
        2
    }

    fn start(&mut self, ctx: &StrategyContext<'_>) -> StrategyAction {
        let Some(source) = find_config(ctx.configs, &ctx.state.source_config_path) else {
            return missing_config(&ctx.state.source_config_path);
        };

        self.step = 1;
        let intermediate = ctx.output_dir.join(format!(
            "{}_template_intermediate.fbx",
            sanitize(&source.clothing_avatar.name)
        ));

        let mut args =
            CoreArguments::from_state(ctx.state, source, ctx.script_path, ctx.base_scene_path);
        args.output_path = intermediate.display().to_string();
        // The intermediate keeps the raw topology and the configuration's own
        // blend-shape defaults; user overrides only apply at step 2.
        args.blend_shape_entries = config_embedded_entries(&source.source_blend_shape_settings);
        args.subdivide = false;
        args.triangulate = false;
        self.intermediate_path = Some(intermediate);

        StrategyAction::Launch {
            args,
            status: format!(
                "Step 1/2: fitting {} onto the template",
                source.clothing_avatar.name
            ),
        }
    }

    fn on_process_exited(&mut self, success: bool, ctx: &StrategyContext<'_>) -> StrategyAction {
        if !success {
            self.output_path = None;
            return StrategyAction::Finish {
                success: false,
                summary: fitting::SUMMARY_EXIT_ERROR.to_string(),
            };
        }
        match self.step {
            1 => self.launch_step_two(ctx),
            _ => StrategyAction::Finish {
                success: true,
                summary: fitting::SUMMARY_SUCCESS.to_string(),
            },
        }
    }

    fn final_output(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }
}
