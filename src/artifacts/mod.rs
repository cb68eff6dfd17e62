//! Solver input artifacts: writing, hashing, restart quarantine and restore.

pub mod gaussian;
pub mod orca;

use crate::core::error::EngineError;
use crate::core::state::write_atomic;
use crate::tripwire::hasher;
use std::path::{Path, PathBuf};

/// A written artifact and its BLAKE3 hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub hash: String,
}

/// Output directory of a block: `<task_dir>/<title>`.
pub fn output_dir(task_dir: &Path, title: &str) -> PathBuf {
    task_dir.join(title)
}

/// Write an artifact atomically and hash it.
pub fn write_artifact(path: &Path, contents: &str) -> Result<Artifact, EngineError> {
    write_atomic(path, contents.as_bytes()).map_err(|e| EngineError::generation(path, e))?;
    Ok(Artifact {
        path: path.to_path_buf(),
        hash: hasher::hash_bytes(contents.as_bytes()),
    })
}

/// First free quarantine directory: `fail`, then `fail1`, `fail2`, ...
pub fn next_quarantine_dir(output_dir: &Path) -> PathBuf {
    let first = output_dir.join("fail");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| output_dir.join(format!("fail{}", n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Move existing `files` into a fresh quarantine directory. The directory is
/// always created, even when nothing is moved.
pub fn quarantine(output_dir: &Path, files: &[PathBuf]) -> Result<PathBuf, EngineError> {
    let dir = next_quarantine_dir(output_dir);
    std::fs::create_dir_all(&dir).map_err(|e| EngineError::generation(&dir, e))?;
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        if !file.exists() {
            tracing::debug!("restart: {} doesn't exist", file.display());
            continue;
        }
        let dest = dir.join(name);
        std::fs::rename(file, &dest).map_err(|e| EngineError::generation(&dest, e))?;
    }
    Ok(dir)
}

/// Move everything in `quarantine_dir` back into `output_dir` and remove
/// the quarantine directory.
pub fn restore(quarantine_dir: &Path, output_dir: &Path) -> Result<(), EngineError> {
    let entries =
        std::fs::read_dir(quarantine_dir).map_err(|e| EngineError::generation(quarantine_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::generation(quarantine_dir, e))?;
        let dest = output_dir.join(entry.file_name());
        std::fs::rename(entry.path(), &dest).map_err(|e| EngineError::generation(&dest, e))?;
    }
    std::fs::remove_dir(quarantine_dir).map_err(|e| EngineError::generation(quarantine_dir, e))
}
