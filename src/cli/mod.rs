//! Command-line interface components
//!
//! This module contains CLI-specific code for the Avatar Fitter application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, FitArgs, GlobalArgs, SetupArgs};
pub use commands::{handle_configs, handle_fit, handle_setup, handle_status};
pub use progress::{FitProgress, SetupProgress};
