use crate::record::Platform;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub const DATA_ROOT: &str = "data";

pub fn platform_dir(data_root: &Path, platform: Platform) -> PathBuf {
    data_root.join(platform.as_str())
}

/// `<platform>[_<id>]_<YYYYmmdd_HHMMSS>.json`
pub fn default_file_name(platform: Platform, id: Option<&str>, now: DateTime<Local>) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    match id {
        Some(id) => format!("{}_{}_{}.json", platform, id, timestamp),
        None => format!("{}_{}.json", platform, timestamp),
    }
}

/// Output files always live under `<data_root>/<platform>/`. A requested path
/// outside that directory keeps only its file name.
pub fn resolve_output_path(
    data_root: &Path,
    platform: Platform,
    requested: Option<&Path>,
    default_name: String,
) -> PathBuf {
    let dir = platform_dir(data_root, platform);
    match requested {
        None => dir.join(default_name),
        Some(path) if path.starts_with(&dir) => path.to_path_buf(),
        Some(path) => match path.file_name() {
            Some(name) => dir.join(name),
            None => dir.join(default_name),
        },
    }
}
