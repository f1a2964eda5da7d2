//! Application constants for Avatar Fitter
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Download sources for the provisioned components
pub mod urls {
    /// Release tag of the fitter core scripts
    pub const CORE_TAG: &str = "v0.4.0-alpha";

    /// Zip archive of the fitter core scripts
    pub const CORE_ZIP_URL: &str =
        "https://github.com/tallcat4/open-fitter-core/archive/refs/tags/v0.4.0-alpha.zip";

    /// Zip archive of the weight-transfer add-on
    pub const ADDON_ZIP_URL: &str =
        "https://github.com/sentfromspacevr/robust-weight-transfer/archive/refs/heads/main.zip";

    /// Blender version the core scripts are validated against
    pub const RECOMMENDED_BLENDER_VERSION: &str = "4.2.0";

    /// Project pages shown next to each setup entry
    pub const BLENDER_WEBSITE: &str = "https://www.blender.org/";
    pub const CORE_WEBSITE: &str = "https://github.com/tallcat4/open-fitter-core";
    pub const ADDON_WEBSITE: &str = "https://github.com/sentfromspacevr/robust-weight-transfer";

    /// Build the Blender release download URL for a version string
    ///
    /// Release folders on download.blender.org group by major.minor,
    /// e.g. `Blender4.2/blender-4.2.0-linux-x64.tar.xz`.
    pub fn blender_download_url(version: &str) -> String {
        let folder = match version.split('.').collect::<Vec<_>>().as_slice() {
            [major, minor, ..] => format!("Blender{}.{}", major, minor),
            _ => format!("Blender{}", version),
        };
        format!(
            "https://download.blender.org/release/{}/{}",
            folder,
            blender_archive_name(version)
        )
    }

    /// Platform-specific Blender archive filename
    pub fn blender_archive_name(version: &str) -> String {
        if cfg!(target_os = "windows") {
            format!("blender-{}-windows-x64.zip", version)
        } else if cfg!(target_os = "macos") {
            format!("blender-{}-macos-x64.dmg", version)
        } else {
            format!("blender-{}-linux-x64.tar.xz", version)
        }
    }
}

/// On-disk layout of the provisioned toolchain
pub mod tools {
    /// Directory (under the workspace root) holding all downloaded tools
    pub const TOOLS_DIR: &str = "BlenderTools";

    /// Downloaded Blender archive filename
    pub const BLENDER_ARCHIVE: &str = "blender.zip";

    /// Directory Blender is extracted into
    pub const BLENDER_DIR: &str = "blender";

    /// Downloaded core archive filename
    pub const CORE_ARCHIVE: &str = "open-fitter-core.zip";

    /// Directory the core scripts are extracted into
    pub const CORE_DIR: &str = "open-fitter-core";

    /// Downloaded add-on archive filename
    pub const ADDON_ARCHIVE: &str = "robust-weight-transfer.zip";

    /// Directory the add-on is extracted into
    pub const ADDON_DIR: &str = "robust-weight-transfer";

    /// Durable marker written after a successful installation.
    /// Readiness of an install is judged by this marker, not by the mere
    /// presence of extracted files, so re-running install is detectable.
    pub const INSTALL_MARKER: &str = ".install-complete";

    /// Core entry-point script names, in preference order
    pub const CORE_SCRIPT_NAMES: &[&str] = &[
        "retarget_script2_10.py",
        "retarget_script2.py",
        "retarget_script.py",
        "retarget.py",
    ];

    /// Blender executable name on this platform
    pub fn blender_executable() -> &'static str {
        if cfg!(target_os = "windows") {
            "blender.exe"
        } else {
            "blender"
        }
    }
}

/// Fitting run configuration
pub mod fitting {
    /// Directory (under the workspace root) where fitted outputs are written
    pub const OUTPUT_DIR: &str = "Outputs";

    /// Directory (under the workspace root) scanned for fitting configs
    pub const CONFIGS_DIR: &str = "Configs";

    /// Default base scene shipped with the fitter core
    pub const DEFAULT_BASE_SCENE: &str = "resources/base.blend";

    /// Avatar name marking the template intermediate representation.
    /// A source config producing this and a target config consuming it
    /// select the two-step continuous strategy.
    pub const TEMPLATE_ROLE_NAME: &str = "Template";

    /// Summary strings surfaced to the UI layer on run completion
    pub const SUMMARY_SUCCESS: &str = "Fitting completed successfully.";
    pub const SUMMARY_EXIT_ERROR: &str = "Process exited with error code.";
    pub const SUMMARY_CANCELLED: &str = "Cancelled by user.";
}

/// Coordinator and tick loop configuration
pub mod ticks {
    use super::Duration;

    /// Interval between orchestrator ticks in the CLI loop
    pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

    /// Interval between progress bar refreshes
    pub const PROGRESS_REFRESH: Duration = Duration::from_millis(200);
}
