//! Core application logic for Avatar Fitter
//!
//! This module contains the main application components: toolchain
//! provisioning (setup), fitting run orchestration, subprocess management,
//! and the data models shared between them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use avatar_fitter::app::setup::{standard_entries, ComponentPaths, SetupCoordinator};
//! use avatar_fitter::app::setup::SystemArchiveExtractor;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! // Provision the Blender toolchain
//! let paths = ComponentPaths::default_layout();
//! let entries = standard_entries(&paths, Arc::new(SystemArchiveExtractor));
//! let mut coordinator = SetupCoordinator::new(entries);
//!
//! coordinator.process_all();
//! coordinator.run_to_completion().await;
//! # }
//! ```

pub mod command;
pub mod config;
pub mod fitting;
pub mod models;
pub mod paths;
pub mod process;
pub mod progress;
pub mod setup;

// Re-export main public API
pub use command::{build_argv, build_command_line, quote, CoreArguments};
pub use config::ConfigCatalog;
pub use fitting::{FitEvent, FitterEnvironment, FittingRunner};
pub use models::{
    find_config, requires_continuous_fitting, AvatarInfo, BlendShapeEntry, BlendShapeSetting,
    ConfigInfo, FitState,
};
pub use process::{FitterProcess, LogSink};
pub use progress::{ExecutionState, ProgressSample};
