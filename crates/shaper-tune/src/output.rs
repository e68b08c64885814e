use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Report path `<dir>/<stem>_<name>-<timestamp>.csv`, where `stem` is the raw
/// capture's file name without a trailing `.csv`.
pub fn report_path(dir: &Path, name: &str, raw_path: &Path, now: DateTime<Local>) -> PathBuf {
    let file_name = raw_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.strip_suffix(".csv") {
        Some(stem) if !stem.is_empty() => stem,
        _ => file_name.as_str(),
    };
    dir.join(format!(
        "{stem}_{name}-{}.csv",
        now.format(TIMESTAMP_FORMAT)
    ))
}

/// Create `path` for writing, creating its parent directory if needed.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
