//! Avatar Fitter CLI application
//!
//! Command-line interface for fitting clothing meshes onto avatars.
//! Provisions the Blender toolchain, then drives one- or two-stage fitting
//! pipelines with streamed logs and progress tracking.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use avatar_fitter::cli::{handle_configs, handle_fit, handle_setup, handle_status, Cli, Commands};
use avatar_fitter::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("Avatar Fitter v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Setup(args) => {
            info!("Executing setup command");
            handle_setup(&cli.global, args).await
        }
        Commands::Fit(args) => {
            info!("Executing fit command");
            handle_fit(&cli.global, args).await
        }
        Commands::Status => {
            info!("Executing status command");
            handle_status(&cli.global).await
        }
        Commands::Configs => {
            info!("Executing configs command");
            handle_configs(&cli.global).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env().add_directive(
        format!("avatar_fitter={}", log_level)
            .parse()
            .unwrap_or_default(),
    );

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
