//! Avatar Fitter Library
//!
//! A Rust library for fitting clothing meshes onto avatars by driving Blender
//! subprocesses. Provisions the required toolchain (Blender, the fitter core
//! scripts, and the weight-transfer add-on), then runs one- or two-stage
//! fitting pipelines with streamed logs and progress.

pub mod app;
pub mod cli;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
