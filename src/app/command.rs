//! Command-line argument construction for the fitter core
//!
//! The fitter core runs inside Blender as a background Python script; one
//! invocation looks like:
//!
//! ```text
//! blender --background --python <script> -- --input <path> --output <path> \
//!     --base <path> --base-fbx <p1;p2> --config <p1;p2> --init-pose <path> ...
//! ```
//!
//! Validation is strict and fails fast: a partially valid command line is
//! never produced. All paths are normalized to absolute form and quoted
//! shell-safely before joining.

use crate::app::models::{absolute_path, BlendShapeEntry, ConfigInfo, FitState};
use crate::errors::{CommandError, CommandResult};

/// Typed argument set for one fitter core invocation
///
/// Constructed fresh per subprocess run and never mutated afterwards; the
/// strategy owns adjusting `output_path` (and for chained runs
/// `input_path`) before handing the value to the process runner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreArguments {
    pub script_path: String,
    pub input_path: String,
    pub output_path: String,
    pub base_scene_path: String,
    pub base_reference_paths: Vec<String>,
    pub config_paths: Vec<String>,
    pub init_pose_path: String,
    pub hips_override: String,
    pub blend_shape_entries: Vec<BlendShapeEntry>,
    pub blend_shape_mappings: Vec<String>,
    pub target_meshes: Vec<String>,
    pub mesh_renderers: Vec<String>,
    pub name_conversions: Vec<String>,
    pub preserve_bone_names: bool,
    pub subdivide: bool,
    pub triangulate: bool,
}

impl CoreArguments {
    /// Assemble arguments from user state and a configuration record
    ///
    /// The input path falls back to the configuration's clothing default
    /// mesh, the base reference list comes from its base avatar, and the
    /// output path is a placeholder the strategy overwrites.
    pub fn from_state(
        state: &FitState,
        config: &ConfigInfo,
        script_path: &str,
        base_scene_path: &str,
    ) -> Self {
        let base_reference_paths = if config.base_avatar.default_mesh_path.is_empty() {
            Vec::new()
        } else {
            vec![config.base_avatar.default_mesh_path.clone()]
        };

        Self {
            script_path: script_path.to_string(),
            input_path: state.resolved_input(config).to_string(),
            output_path: "output.fbx".to_string(),
            base_scene_path: base_scene_path.to_string(),
            base_reference_paths,
            config_paths: vec![config.config_path.clone()],
            init_pose_path: config.resolved_init_pose().to_string(),
            hips_override: state.hips_override.clone(),
            blend_shape_entries: Vec::new(),
            blend_shape_mappings: state.blend_shape_mappings.clone(),
            target_meshes: state.target_meshes.clone(),
            mesh_renderers: state.mesh_renderers.clone(),
            name_conversions: state.name_conversions.clone(),
            preserve_bone_names: state.preserve_bone_names,
            subdivide: state.subdivide,
            triangulate: state.triangulate,
        }
    }

    fn validate(&self) -> CommandResult<()> {
        if self.script_path.trim().is_empty() {
            return Err(CommandError::MissingArgument {
                field: "script_path",
            });
        }
        if self.input_path.trim().is_empty() {
            return Err(CommandError::MissingArgument { field: "input_path" });
        }
        if self.base_scene_path.trim().is_empty() {
            return Err(CommandError::MissingArgument {
                field: "base_scene_path",
            });
        }
        if self.init_pose_path.trim().is_empty() {
            return Err(CommandError::MissingArgument {
                field: "init_pose_path",
            });
        }
        if self.base_reference_paths.is_empty() {
            return Err(CommandError::EmptyList {
                field: "base_reference_paths",
            });
        }
        if self.config_paths.is_empty() {
            return Err(CommandError::EmptyList {
                field: "config_paths",
            });
        }
        Ok(())
    }

    /// Enabled blend-shape overrides as parallel `;`-joined name/value lists
    fn blend_shape_args(&self) -> (String, String) {
        let mut names = Vec::new();
        let mut values = Vec::new();
        for entry in &self.blend_shape_entries {
            if entry.enabled && !entry.custom_name.trim().is_empty() {
                names.push(entry.custom_name.clone());
                values.push(format!("{:.1}", entry.value));
            }
        }
        (names.join(";"), values.join(";"))
    }
}

/// Quote a value for command-line usage
///
/// Embedded double quotes are backslash-escaped; a trailing backslash is
/// doubled so it cannot escape the closing quote.
pub fn quote(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    let mut escaped = value.replace('"', "\\\"");
    if escaped.ends_with('\\') {
        escaped.push('\\');
    }
    format!("\"{}\"", escaped)
}

fn absolute(path: &str) -> String {
    absolute_path(path).display().to_string()
}

fn absolute_joined(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| absolute(p))
        .collect::<Vec<_>>()
        .join(";")
}

fn push_if_value(segments: &mut Vec<String>, flag: &str, value: &str) {
    if value.trim().is_empty() {
        return;
    }
    segments.push(flag.to_string());
    segments.push(quote(value));
}

/// Build the full quoted argument string for one invocation
///
/// Fails before producing anything when a required field is missing.
pub fn build_command_line(args: &CoreArguments) -> CommandResult<String> {
    Ok(build_segments(args)?.join(" "))
}

/// Build the raw argument vector for the process runner
///
/// Same validation and ordering as [`build_command_line`], without quoting:
/// the process API passes arguments without a shell.
pub fn build_argv(args: &CoreArguments) -> CommandResult<Vec<String>> {
    let segments = build_segments(args)?;
    Ok(segments.into_iter().map(unquote_segment).collect())
}

fn unquote_segment(segment: String) -> String {
    if segment.len() >= 2 && segment.starts_with('"') && segment.ends_with('"') {
        let inner = &segment[1..segment.len() - 1];
        let mut out = inner.replace("\\\"", "\"");
        if out.ends_with("\\\\") {
            out.pop();
        }
        out
    } else {
        segment
    }
}

fn build_segments(args: &CoreArguments) -> CommandResult<Vec<String>> {
    args.validate()?;

    let mut segments = vec![
        "--background".to_string(),
        "--python".to_string(),
        quote(&absolute(&args.script_path)),
        "--".to_string(),
        "--input".to_string(),
        quote(&absolute(&args.input_path)),
        "--output".to_string(),
        quote(&absolute(&args.output_path)),
        "--base".to_string(),
        quote(&absolute(&args.base_scene_path)),
        "--base-fbx".to_string(),
        quote(&absolute_joined(&args.base_reference_paths)),
        "--config".to_string(),
        quote(&absolute_joined(&args.config_paths)),
        "--init-pose".to_string(),
        quote(&absolute(&args.init_pose_path)),
    ];

    push_if_value(&mut segments, "--hips-position", &args.hips_override);

    let (blend_shapes, blend_shape_values) = args.blend_shape_args();
    push_if_value(&mut segments, "--blend-shapes", &blend_shapes);
    push_if_value(&mut segments, "--blend-shape-values", &blend_shape_values);
    push_if_value(
        &mut segments,
        "--blend-shape-mappings",
        &args.blend_shape_mappings.join(";"),
    );
    push_if_value(&mut segments, "--target-meshes", &args.target_meshes.join(";"));
    push_if_value(&mut segments, "--mesh-renderers", &args.mesh_renderers.join(";"));
    push_if_value(&mut segments, "--name-conv", &args.name_conversions.join(";"));

    if args.preserve_bone_names {
        segments.push("--preserve-bone-names".to_string());
    }
    // The tool runs both post-processes by default; only opt-outs are passed.
    if !args.subdivide {
        segments.push("--no-subdivision".to_string());
    }
    if !args.triangulate {
        segments.push("--no-triangle".to_string());
    }

    Ok(segments)
}
