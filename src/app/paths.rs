//! Output locations and artifact naming

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::constants::fitting;

/// Resolve the directory that finished meshes land in, creating it on demand
pub fn ensure_output_dir(root: &Path) -> std::io::Result<PathBuf> {
    let dir = root.join(fitting::OUTPUT_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Timestamped output filename for a clothing-to-avatar run
///
/// Shaped as `{clothing}_to_{base}_{yyyyMMdd_HHmmss}.fbx` with filesystem
/// unfriendly characters replaced.
pub fn output_file_name(clothing_avatar: &str, base_avatar: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!(
        "{}_to_{}_{}.fbx",
        sanitize(clothing_avatar),
        sanitize(base_avatar),
        stamp
    )
}

/// Replace characters that are invalid in file names on common platforms
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.trim().is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
