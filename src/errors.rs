//! Error types for Avatar Fitter
//!
//! This module defines error types for all components of the application,
//! organized by the stage of the pipeline that can produce them. Errors are
//! designed to be actionable: validation problems are reported before any
//! subprocess is spawned, and runtime failures carry enough context to tell
//! the user which component or step went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from provisioning tasks and the setup coordinator
#[derive(Error, Debug)]
pub enum SetupError {
    /// HTTP request failed during a component download
    #[error("HTTP request failed during download")]
    Http(#[from] reqwest::Error),

    /// I/O error during download or installation
    #[error("File I/O error during setup")]
    Io(#[from] std::io::Error),

    /// Archive extraction failed
    #[error("Archive extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    /// A task was started while its prerequisite was still not ready
    #[error("Cannot start '{entry}': prerequisite '{prerequisite}' is not ready")]
    PrerequisiteNotReady { entry: String, prerequisite: String },

    /// A task or the whole sequence was started while already running
    #[error("Setup task '{entry}' is already running")]
    AlreadyRunning { entry: String },

    /// No entry with the requested identifier exists
    #[error("No setup entry named '{name}'")]
    EntryNotFound { name: String },
}

/// Validation errors from the command argument builder
///
/// These are always detected before a subprocess is spawned and are never
/// retried automatically.
#[derive(Error, Debug)]
pub enum CommandError {
    /// A required scalar argument is empty
    #[error("Required argument missing: {field}")]
    MissingArgument { field: &'static str },

    /// A required list argument has no elements
    #[error("Required argument list is empty: {field}")]
    EmptyList { field: &'static str },
}

/// Errors from launching and supervising the external tool process
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The OS refused to spawn the process (missing executable, permissions)
    #[error("Failed to start process '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// I/O error while supervising the process
    #[error("Process I/O error")]
    Io(#[from] std::io::Error),
}

/// Errors terminal for a single fitting run
#[derive(Error, Debug)]
pub enum FittingError {
    /// A fitting run is already active
    #[error("A fitting run is already in progress")]
    AlreadyRunning,

    /// No configuration record matches the selected path
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: String },

    /// Argument validation failed before launch
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The subprocess could not be started or supervised
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Configuration catalog errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration directory or file not found
    #[error("Configuration path not found: {path}")]
    NotFound { path: PathBuf },

    /// JSON parsing error in a configuration record
    #[error("Invalid configuration record: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Setup/provisioning error
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Command argument validation error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Process execution error
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Fitting run error
    #[error(transparent)]
    Fitting(#[from] FittingError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Setup(_) => "setup",
            AppError::Command(_) => "command",
            AppError::Process(_) => "process",
            AppError::Fitting(_) => "fitting",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Setup result type alias
pub type SetupTaskResult<T> = std::result::Result<T, SetupError>;

/// Command builder result type alias
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Fitting result type alias
pub type FittingResult<T> = std::result::Result<T, FittingError>;
