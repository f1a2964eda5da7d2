//! Command-line argument parsing for Avatar Fitter
//!
//! This module defines the CLI structure using clap derive macros, covering
//! toolchain provisioning, fitting runs, and configuration discovery.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Avatar Fitter - fit clothing meshes onto avatars with Blender
#[derive(Parser, Debug)]
#[command(
    name = "avatar_fitter",
    version,
    about = "Fit clothing meshes onto avatars by driving Blender subprocesses",
    long_about = "Provisions a Blender toolchain (Blender, the fitter core scripts and the
weight-transfer add-on), then runs one- or two-stage fitting pipelines with
streamed logs and progress."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Toolchain directory (default: ./BlenderTools)
    #[arg(long, global = true, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Directory scanned for fitting configuration files
    #[arg(long, global = true, value_name = "DIR")]
    pub configs_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and install the Blender toolchain
    Setup(SetupArgs),

    /// Run a fitting pipeline
    Fit(FitArgs),

    /// Show toolchain readiness
    Status,

    /// List available fitting configurations
    Configs,
}

/// Arguments for the setup command
#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    /// Run a single named setup step instead of the full sequence
    #[arg(short, long, value_name = "NAME")]
    pub task: Option<String>,

    /// List setup steps and their readiness without running anything
    #[arg(short, long)]
    pub list: bool,
}

/// Arguments for the fit command
#[derive(Args, Debug, Clone)]
pub struct FitArgs {
    /// Input clothing mesh (default: the configuration's clothing mesh)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Source configuration (file path or display name)
    #[arg(short, long, value_name = "CONFIG")]
    pub source: Option<String>,

    /// Target configuration (file path or display name)
    #[arg(short, long, value_name = "CONFIG")]
    pub target: Option<String>,

    /// Output directory (default: ./Outputs)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Hips position override passed through to the fitter core
    #[arg(long, value_name = "VALUE")]
    pub hips_position: Option<String>,

    /// Blend-shape override as NAME=VALUE (repeatable)
    #[arg(long = "blend-shape", value_name = "NAME=VALUE")]
    pub blend_shapes: Vec<String>,

    /// Blend-shape name mapping directive (repeatable)
    #[arg(long = "mapping", value_name = "MAPPING")]
    pub mappings: Vec<String>,

    /// Restrict fitting to a named mesh (repeatable)
    #[arg(long = "target-mesh", value_name = "NAME")]
    pub target_meshes: Vec<String>,

    /// Renderer name carried through to the output (repeatable)
    #[arg(long = "mesh-renderer", value_name = "NAME")]
    pub mesh_renderers: Vec<String>,

    /// Bone name conversion directive (repeatable)
    #[arg(long = "name-conv", value_name = "CONV")]
    pub name_conversions: Vec<String>,

    /// Keep original bone names in the output
    #[arg(long)]
    pub preserve_bone_names: bool,

    /// Disable the subdivision post-process
    #[arg(long)]
    pub no_subdivision: bool,

    /// Disable the triangulation post-process
    #[arg(long)]
    pub no_triangle: bool,

    /// Print the Blender command line without launching anything
    #[arg(long)]
    pub print_command: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}
