//! Core data structures for configurations and fitting state
//!
//! This module defines the immutable configuration records supplied by the
//! configuration collaborator, the blend-shape value types, and the per-run
//! user state consumed by the fitting strategies.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::fitting;

/// Information about one avatar referenced by a configuration
///
/// A configuration names two avatars: the base (what is fitted onto) and the
/// clothing (what is fitted). Either may carry the template role, which
/// marks an intermediate representation used to chain two fitting runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarInfo {
    /// Display name of the avatar
    pub name: String,
    /// Default mesh file used when the caller supplies no explicit input
    #[serde(default)]
    pub default_mesh_path: String,
    /// Descriptor file holding pose and blend-shape metadata
    #[serde(default)]
    pub descriptor_path: String,
}

impl AvatarInfo {
    /// Whether this avatar carries the template role.
    ///
    /// The policy is case-insensitive name equality with `"Template"`,
    /// matching how configurations mark their intermediate representation.
    pub fn is_template(&self) -> bool {
        !self.name.is_empty() && self.name.eq_ignore_ascii_case(fitting::TEMPLATE_ROLE_NAME)
    }
}

/// A blend-shape default carried by a configuration record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeSetting {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: f32,
}

/// A complete fitting configuration record
///
/// Records are immutable once loaded; strategies consume them read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigInfo {
    /// Path of the configuration file itself (stable identifier).
    /// Set by the catalog on load rather than stored in the file.
    #[serde(default)]
    pub config_path: String,
    /// Human-readable name shown in status messages
    #[serde(default)]
    pub display_name: String,
    /// The avatar fitted onto (downstream output shape)
    pub base_avatar: AvatarInfo,
    /// The avatar being fitted (upstream input shape)
    pub clothing_avatar: AvatarInfo,
    /// Pose data file referenced by the core scripts
    #[serde(default)]
    pub pose_data_path: String,
    /// Initial pose descriptor required by every invocation
    #[serde(default)]
    pub init_pose_path: String,
    /// Blend-shape defaults applied when the caller supplies no overrides
    #[serde(default)]
    pub source_blend_shape_settings: Vec<BlendShapeSetting>,
    #[serde(default)]
    pub target_blend_shape_settings: Vec<BlendShapeSetting>,
}

impl ConfigInfo {
    /// Resolve the init-pose path, falling back to the base avatar descriptor
    pub fn resolved_init_pose(&self) -> &str {
        if self.init_pose_path.is_empty() {
            &self.base_avatar.descriptor_path
        } else {
            &self.init_pose_path
        }
    }
}

/// A user-editable blend-shape override for one fitting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeEntry {
    pub enabled: bool,
    pub original_name: String,
    pub custom_name: String,
    pub value: f32,
}

impl Default for BlendShapeEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            original_name: String::new(),
            custom_name: String::new(),
            value: 100.0,
        }
    }
}

/// Per-run user state consumed by the fitting strategies
///
/// This is a plain value type assembled by the caller (CLI flags or an
/// embedding UI) before `FittingRunner::execute`. It is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitState {
    /// Input mesh; empty means "use the config's clothing default mesh"
    #[serde(default)]
    pub input_path: String,
    /// Stable identifier of the source configuration
    #[serde(default)]
    pub source_config_path: String,
    /// Stable identifier of the target configuration
    #[serde(default)]
    pub target_config_path: String,
    /// Optional hips position override passed through to the tool
    #[serde(default)]
    pub hips_override: String,
    /// User-editable blend-shape overrides for this run
    #[serde(default)]
    pub blend_shape_entries: Vec<BlendShapeEntry>,
    /// Blend-shape name mapping directives
    #[serde(default)]
    pub blend_shape_mappings: Vec<String>,
    /// Mesh subset the fit is restricted to
    #[serde(default)]
    pub target_meshes: Vec<String>,
    /// Renderer names carried through to the output
    #[serde(default)]
    pub mesh_renderers: Vec<String>,
    /// Bone name conversion directives
    #[serde(default)]
    pub name_conversions: Vec<String>,
    /// Keep original bone names in the output
    #[serde(default)]
    pub preserve_bone_names: bool,
    /// Run the subdivision post-process (tool default is on)
    #[serde(default = "default_true")]
    pub subdivide: bool,
    /// Run the triangulation post-process (tool default is on)
    #[serde(default = "default_true")]
    pub triangulate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FitState {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            source_config_path: String::new(),
            target_config_path: String::new(),
            hips_override: String::new(),
            blend_shape_entries: Vec::new(),
            blend_shape_mappings: Vec::new(),
            target_meshes: Vec::new(),
            mesh_renderers: Vec::new(),
            name_conversions: Vec::new(),
            preserve_bone_names: false,
            subdivide: true,
            triangulate: true,
        }
    }
}

impl FitState {
    /// Resolve the effective input path against a configuration record
    pub fn resolved_input<'a>(&'a self, config: &'a ConfigInfo) -> &'a str {
        if self.input_path.is_empty() {
            &config.clothing_avatar.default_mesh_path
        } else {
            &self.input_path
        }
    }
}

/// Find a configuration record by its stable path identifier
pub fn find_config<'a>(configs: &'a [ConfigInfo], path: &str) -> Option<&'a ConfigInfo> {
    configs.iter().find(|c| c.config_path == path)
}

/// Whether the selected source/target pair requires the two-step strategy
///
/// Chaining is required when the source configuration produces the template
/// intermediate representation (its base avatar is the template) and the
/// target configuration consumes it (its clothing avatar is the template).
pub fn requires_continuous_fitting(
    state: &FitState,
    configs: &[ConfigInfo],
) -> bool {
    let source = find_config(configs, &state.source_config_path);
    let target = find_config(configs, &state.target_config_path);
    match (source, target) {
        (Some(source), Some(target)) => {
            source.base_avatar.is_template() && target.clothing_avatar.is_template()
        }
        _ => false,
    }
}

/// Normalize a path string to absolute form
pub fn absolute_path(path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: &str, base_name: &str, clothing_name: &str) -> ConfigInfo {
        ConfigInfo {
            config_path: path.to_string(),
            display_name: path.to_string(),
            base_avatar: AvatarInfo {
                name: base_name.to_string(),
                ..Default::default()
            },
            clothing_avatar: AvatarInfo {
                name: clothing_name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_template_role_is_case_insensitive() {
        let avatar = AvatarInfo {
            name: "template".to_string(),
            ..Default::default()
        };
        assert!(avatar.is_template());

        let avatar = AvatarInfo {
            name: "TEMPLATE".to_string(),
            ..Default::default()
        };
        assert!(avatar.is_template());

        let avatar = AvatarInfo::default();
        assert!(!avatar.is_template());
    }

    #[test]
    fn test_continuous_requires_template_on_both_sides() {
        let configs = vec![
            config("a.json", "Template", "CoatA"),
            config("b.json", "BaseB", "Template"),
            config("c.json", "BaseC", "CoatC"),
        ];

        let state = FitState {
            source_config_path: "a.json".to_string(),
            target_config_path: "b.json".to_string(),
            ..Default::default()
        };
        assert!(requires_continuous_fitting(&state, &configs));

        // Source does not emit a template: single step
        let state = FitState {
            source_config_path: "c.json".to_string(),
            target_config_path: "b.json".to_string(),
            ..Default::default()
        };
        assert!(!requires_continuous_fitting(&state, &configs));

        // Unknown config paths: single step
        let state = FitState {
            source_config_path: "missing.json".to_string(),
            target_config_path: "b.json".to_string(),
            ..Default::default()
        };
        assert!(!requires_continuous_fitting(&state, &configs));
    }

    #[test]
    fn test_input_falls_back_to_config_default() {
        let mut cfg = config("a.json", "Base", "Coat");
        cfg.clothing_avatar.default_mesh_path = "meshes/coat.fbx".to_string();

        let state = FitState::default();
        assert_eq!(state.resolved_input(&cfg), "meshes/coat.fbx");

        let state = FitState {
            input_path: "override.fbx".to_string(),
            ..Default::default()
        };
        assert_eq!(state.resolved_input(&cfg), "override.fbx");
    }

    #[test]
    fn test_fit_state_post_processing_defaults_on() {
        let state: FitState = serde_json::from_str("{}").unwrap();
        assert!(state.subdivide);
        assert!(state.triangulate);
        assert!(!state.preserve_bone_names);
    }
}
