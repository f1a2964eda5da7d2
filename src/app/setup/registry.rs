//! Standard provisioning sequence for the Blender toolchain
//!
//! Builds the ordered entry list the setup coordinator drives: download and
//! install for each of the three components (Blender, the fitter core, the
//! weight-transfer add-on), followed by an environment validation entry.
//! Entries are keyed by stable names so an embedding UI can trigger a single
//! component without knowing how the orchestration is wired.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::{tools, urls};

use super::coordinator::SetupEntry;
use super::tasks::{ArchiveExtractor, DownloadTask, InstallTask, ValidationTask};
use super::{shared, SharedTask};

/// Stable entry identifiers for out-of-sequence starts
pub mod ids {
    pub const BLENDER_DOWNLOAD: &str = "Blender download";
    pub const BLENDER_INSTALL: &str = "Blender install";
    pub const CORE_DOWNLOAD: &str = "Fitter core download";
    pub const CORE_INSTALL: &str = "Fitter core install";
    pub const ADDON_DOWNLOAD: &str = "Weight-transfer add-on download";
    pub const ADDON_INSTALL: &str = "Weight-transfer add-on install";
    pub const VALIDATION: &str = "Environment validation";
}

/// On-disk locations of the provisioned components
#[derive(Debug, Clone)]
pub struct ComponentPaths {
    tools_dir: PathBuf,
}

impl ComponentPaths {
    pub fn new(tools_dir: PathBuf) -> Self {
        Self { tools_dir }
    }

    /// Default layout under the platform data directory, falling back to
    /// the current working directory when none is available
    pub fn default_layout() -> Self {
        let root = dirs::data_local_dir()
            .map(|dir| dir.join("avatar-fitter"))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root.join(tools::TOOLS_DIR))
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn blender_archive(&self) -> PathBuf {
        self.tools_dir.join(tools::BLENDER_ARCHIVE)
    }

    pub fn blender_dir(&self) -> PathBuf {
        self.tools_dir.join(tools::BLENDER_DIR)
    }

    /// Resolve the Blender executable inside the install directory
    ///
    /// Release archives nest a versioned folder, so if the executable is
    /// not at the top level the first-level subdirectories are checked too.
    pub fn blender_executable(&self) -> Option<PathBuf> {
        let exe = tools::blender_executable();
        let direct = self.blender_dir().join(exe);
        if direct.is_file() {
            return Some(direct);
        }
        let entries = std::fs::read_dir(self.blender_dir()).ok()?;
        for entry in entries.flatten() {
            let candidate = entry.path().join(exe);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    pub fn core_archive(&self) -> PathBuf {
        self.tools_dir.join(tools::CORE_ARCHIVE)
    }

    pub fn core_dir(&self) -> PathBuf {
        self.tools_dir.join(tools::CORE_DIR)
    }

    /// Locate the core entry-point script, trying preferred names in order
    pub fn core_script(&self) -> Option<PathBuf> {
        let root = self.core_dir();
        for name in tools::CORE_SCRIPT_NAMES {
            if let Some(found) = find_file(&root, name) {
                return Some(found);
            }
        }
        None
    }

    /// Locate the base scene shipped inside the extracted core
    pub fn base_scene(&self) -> Option<PathBuf> {
        let scene_name = Path::new(crate::constants::fitting::DEFAULT_BASE_SCENE)
            .file_name()?
            .to_str()?;
        find_file(&self.core_dir(), scene_name)
    }

    pub fn addon_archive(&self) -> PathBuf {
        self.tools_dir.join(tools::ADDON_ARCHIVE)
    }

    pub fn addon_dir(&self) -> PathBuf {
        self.tools_dir.join(tools::ADDON_DIR)
    }
}

/// Recursive filename search below a root directory
fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.file_name().map(|n| n == name).unwrap_or(false) {
            return Some(path);
        }
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.iter().find_map(|dir| find_file(dir, name))
}

/// Build the standard ordered setup sequence
pub fn standard_entries(
    paths: &ComponentPaths,
    extractor: Arc<dyn ArchiveExtractor>,
) -> Vec<SetupEntry> {
    let blender_download: SharedTask = shared(DownloadTask::new(
        ids::BLENDER_DOWNLOAD,
        urls::blender_download_url(urls::RECOMMENDED_BLENDER_VERSION),
        paths.blender_archive(),
    ));
    let blender_install: SharedTask = shared(InstallTask::new(
        ids::BLENDER_INSTALL,
        paths.blender_archive(),
        paths.blender_dir(),
        urls::RECOMMENDED_BLENDER_VERSION,
        extractor.clone(),
    ));
    let core_download: SharedTask = shared(DownloadTask::new(
        ids::CORE_DOWNLOAD,
        urls::CORE_ZIP_URL,
        paths.core_archive(),
    ));
    let core_install: SharedTask = shared(InstallTask::new(
        ids::CORE_INSTALL,
        paths.core_archive(),
        paths.core_dir(),
        urls::CORE_TAG,
        extractor.clone(),
    ));
    let addon_download: SharedTask = shared(DownloadTask::new(
        ids::ADDON_DOWNLOAD,
        urls::ADDON_ZIP_URL,
        paths.addon_archive(),
    ));
    let addon_install: SharedTask = shared(InstallTask::new(
        ids::ADDON_INSTALL,
        paths.addon_archive(),
        paths.addon_dir(),
        "main",
        extractor,
    ));
    let validation: SharedTask = shared(ValidationTask::new(vec![
        ("Blender".to_string(), blender_install.clone()),
        ("Fitter core".to_string(), core_install.clone()),
        ("Weight-transfer add-on".to_string(), addon_install.clone()),
    ]));

    vec![
        SetupEntry::new(ids::BLENDER_DOWNLOAD, blender_download.clone())
            .with_website(urls::BLENDER_WEBSITE),
        SetupEntry::new(ids::BLENDER_INSTALL, blender_install)
            .with_prerequisite(ids::BLENDER_DOWNLOAD, blender_download),
        SetupEntry::new(ids::CORE_DOWNLOAD, core_download.clone())
            .with_website(urls::CORE_WEBSITE),
        SetupEntry::new(ids::CORE_INSTALL, core_install)
            .with_prerequisite(ids::CORE_DOWNLOAD, core_download),
        SetupEntry::new(ids::ADDON_DOWNLOAD, addon_download.clone())
            .with_website(urls::ADDON_WEBSITE),
        SetupEntry::new(ids::ADDON_INSTALL, addon_install)
            .with_prerequisite(ids::ADDON_DOWNLOAD, addon_download),
        SetupEntry::new(ids::VALIDATION, validation),
    ]
}
