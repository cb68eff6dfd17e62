//! Task-directory discovery under the calculation directory.

use super::error::EngineError;
use std::path::{Path, PathBuf};

/// Base-structure extensions, in lookup order.
pub const STRUCTURE_EXTENSIONS: [&str; 4] = ["com", "gjf", "xyz", "log"];

/// A directory holding one task file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDir {
    pub dir: PathBuf,
    pub task_file: PathBuf,
    pub base_name: String,
}

impl TaskDir {
    /// Task directory for a `.task` file path, or for a directory holding one.
    pub fn for_path(path: &Path) -> Result<Self, EngineError> {
        if path.is_dir() {
            let task_file = first_task_file(path)?.ok_or_else(|| {
                EngineError::Config(format!("no .task file in {}", path.display()))
            })?;
            return Ok(Self::from_task_file(path, task_file));
        }
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(Self::from_task_file(dir, path.to_path_buf()))
    }

    fn from_task_file(dir: &Path, task_file: PathBuf) -> Self {
        let base_name = task_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            dir: dir.to_path_buf(),
            task_file,
            base_name,
        }
    }
}

/// Every direct subdirectory of `calc_dir` that holds a `.task` file,
/// sorted by directory name. The first `.task` file by name wins.
pub fn find_task_dirs(calc_dir: &Path) -> Result<Vec<TaskDir>, EngineError> {
    let pattern = format!(
        "{}/*/*.task",
        glob::Pattern::escape(&calc_dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| EngineError::Config(format!("bad calc dir pattern {}: {}", pattern, e)))?;

    let mut found: Vec<TaskDir> = Vec::new();
    for path in paths.filter_map(Result::ok) {
        if !path.is_file() {
            continue;
        }
        let Some(dir) = path.parent() else { continue };
        // glob yields sorted paths, so the first hit per directory wins
        if found.last().is_some_and(|t| t.dir == dir) {
            continue;
        }
        found.push(TaskDir::from_task_file(dir, path.clone()));
    }
    Ok(found)
}

fn first_task_file(dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    let pattern = format!("{}/*.task", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths = glob::glob(&pattern)
        .map_err(|e| EngineError::Config(format!("bad pattern {}: {}", pattern, e)))?;
    Ok(paths.find_map(Result::ok))
}

/// `<dir>/<base>.{com,gjf,xyz,log}`, first existing.
pub fn find_structure_file(dir: &Path, base_name: &str) -> Option<PathBuf> {
    STRUCTURE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", base_name, ext)))
        .find(|p| p.is_file())
}
