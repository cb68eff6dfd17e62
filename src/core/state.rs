//! State sidecar and task-file title markers.
//!
//! The sidecar `<task_dir>/.tasker/<base>.state.yaml` is the authoritative
//! completion record. The `$"title"` quote in the task file is the visible
//! marker, kept in step with it. Every write is temp file + rename.

use super::error::EngineError;
use super::parser::parse_title;
use super::types::{BlockState, BlockStatus, StateFile};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".tasker";
const SCHEMA: &str = "1.0";

/// Per-directory state directory.
pub fn state_dir(task_dir: &Path) -> PathBuf {
    task_dir.join(STATE_DIR)
}

/// Sidecar path for a task file's base name.
pub fn state_file_path(task_dir: &Path, base_name: &str) -> PathBuf {
    state_dir(task_dir).join(format!("{}.state.yaml", base_name))
}

/// Write `data` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)
}

/// Load the sidecar. Returns None if it doesn't exist.
pub fn load_state(task_dir: &Path, base_name: &str) -> Result<Option<StateFile>, EngineError> {
    let path = state_file_path(task_dir, base_name);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| EngineError::State(format!("cannot read {}: {}", path.display(), e)))?;
    let state: StateFile = serde_yaml_ng::from_str(&content)
        .map_err(|e| EngineError::State(format!("invalid sidecar {}: {}", path.display(), e)))?;
    Ok(Some(state))
}

/// Save the sidecar atomically.
pub fn save_state(task_dir: &Path, state: &mut StateFile) -> Result<(), EngineError> {
    use crate::tripwire::eventlog::now_iso8601;
    state.generated_at = now_iso8601();
    let path = state_file_path(task_dir, &state.task);
    let yaml = serde_yaml_ng::to_string(state)
        .map_err(|e| EngineError::State(format!("serialize error: {}", e)))?;
    write_atomic(&path, yaml.as_bytes())
        .map_err(|e| EngineError::State(format!("cannot write {}: {}", path.display(), e)))
}

/// Create an empty sidecar for a task file.
pub fn new_state(base_name: &str) -> StateFile {
    use crate::tripwire::eventlog::now_iso8601;
    StateFile {
        schema: SCHEMA.to_string(),
        task: base_name.to_string(),
        generated_at: now_iso8601(),
        generator: format!("tasker {}", env!("CARGO_PKG_VERSION")),
        blocks: indexmap::IndexMap::new(),
    }
}

/// Whether the sidecar records `title` as done for `definition_hash`.
pub fn is_recorded_done(state: Option<&StateFile>, title: &str, definition_hash: &str) -> bool {
    state
        .and_then(|s| s.blocks.get(title))
        .is_some_and(|bs| bs.status == BlockStatus::Done && bs.definition_hash == definition_hash)
}

/// Sidecar entry for `title`, created as pending on first use.
pub fn block_entry<'a>(
    state: &'a mut StateFile,
    title: &str,
    definition_hash: &str,
) -> &'a mut BlockState {
    state
        .blocks
        .entry(title.to_string())
        .or_insert_with(|| BlockState {
            status: BlockStatus::Pending,
            definition_hash: definition_hash.to_string(),
            generated_at: None,
            commands_emitted: false,
            error: None,
            artifacts: indexmap::IndexMap::new(),
        })
}

// ============================================================================
// Title markers
// ============================================================================

/// Rewrite `$title` as `$"title"`. Targets line `line_hint` when it still
/// holds that title, else the first line whose whole title is `title`.
/// Returns false when the title is already quoted or absent.
pub fn mark_title_quoted(task_file: &Path, title: &str, line_hint: usize) -> io::Result<bool> {
    rewrite_title(task_file, title, line_hint, true)
}

/// Rewrite `$"title"` back to `$title`.
pub fn unquote_title(task_file: &Path, title: &str) -> io::Result<bool> {
    rewrite_title(task_file, title, usize::MAX, false)
}

fn rewrite_title(task_file: &Path, title: &str, line_hint: usize, quote: bool) -> io::Result<bool> {
    let content = std::fs::read_to_string(task_file)?;
    let mut lines: Vec<&str> = content.split_inclusive('\n').collect();

    // Title lines start at column 0, as the parser reads them
    let matches = |line: &str| {
        line.strip_prefix('$')
            .map(parse_title)
            .is_some_and(|(t, quoted)| t == title && quoted != quote)
    };

    let target = if lines.get(line_hint).is_some_and(|l| matches(*l)) {
        Some(line_hint)
    } else {
        lines.iter().position(|l| matches(*l))
    };
    let Some(idx) = target else {
        return Ok(false);
    };

    let line = lines[idx];
    let ending = &line[line.trim_end_matches(['\r', '\n']).len()..];
    let rewritten = if quote {
        format!("$\"{}\"{}", title, ending)
    } else {
        format!("${}{}", title, ending)
    };
    lines[idx] = &rewritten;

    write_atomic(task_file, lines.concat().as_bytes())?;
    Ok(true)
}

// ============================================================================
// Pass lock
// ============================================================================

/// Exclusive advisory lock on a task directory for the length of a pass.
#[derive(Debug)]
pub struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    /// Try to take the lock; `Locked` if another process holds it.
    pub fn acquire(task_dir: &Path) -> Result<Self, EngineError> {
        let dir = state_dir(task_dir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::State(format!("cannot create {}: {}", dir.display(), e)))?;
        let path = dir.join("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| EngineError::State(format!("cannot open {}: {}", path.display(), e)))?;
        file.try_lock_exclusive().map_err(|_| EngineError::Locked {
            path: task_dir.to_path_buf(),
        })?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_path() {
        let p = state_file_path(Path::new("/calc/methane"), "methane");
        assert_eq!(p, PathBuf::from("/calc/methane/.tasker/methane.state.yaml"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = new_state("methane");
        block_entry(&mut state, "opt", "blake3:a").status = BlockStatus::Done;
        block_entry(&mut state, "td", "blake3:b");
        save_state(dir.path(), &mut state).unwrap();

        let loaded = load_state(dir.path(), "methane").unwrap().unwrap();
        let keys: Vec<_> = loaded.blocks.keys().collect();
        assert_eq!(keys, vec!["opt", "td"]);
        assert_eq!(loaded.blocks["opt"].status, BlockStatus::Done);
        assert!(!state_dir(dir.path()).join("methane.state.yaml.tmp").exists());
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_state(dir.path(), "ghost").unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(&state_file_path(dir.path(), "m"), b"blocks: [").unwrap();
        assert!(matches!(
            load_state(dir.path(), "m"),
            Err(EngineError::State(_))
        ));
    }

    #[test]
    fn test_is_recorded_done() {
        let mut state = new_state("m");
        block_entry(&mut state, "opt", "blake3:a").status = BlockStatus::Done;
        block_entry(&mut state, "td", "blake3:b").status = BlockStatus::Failed;
        assert!(is_recorded_done(Some(&state), "opt", "blake3:a"));
        assert!(!is_recorded_done(Some(&state), "opt", "blake3:changed"));
        assert!(!is_recorded_done(Some(&state), "td", "blake3:b"));
        assert!(!is_recorded_done(None, "opt", "blake3:a"));
    }

    #[test]
    fn test_quote_exact_title_only() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("m.task");
        std::fs::write(&task, "$opt2\n# opt\n\n$opt\n# opt freq\n").unwrap();

        assert!(mark_title_quoted(&task, "opt", 0).unwrap());
        assert_eq!(
            std::fs::read_to_string(&task).unwrap(),
            "$opt2\n# opt\n\n$\"opt\"\n# opt freq\n"
        );
        // Second call is a no-op
        assert!(!mark_title_quoted(&task, "opt", 3).unwrap());
    }

    #[test]
    fn test_quote_preserves_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("m.task");
        std::fs::write(&task, "$td\r\n# td\r\n").unwrap();
        assert!(mark_title_quoted(&task, "td", 0).unwrap());
        assert_eq!(
            std::fs::read_to_string(&task).unwrap(),
            "$\"td\"\r\n# td\r\n"
        );
    }

    #[test]
    fn test_indented_dollar_is_not_a_title() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("m.task");
        std::fs::write(&task, "  $td\n# td\n").unwrap();
        assert!(crate::core::parser::parse_blocks("  $td\n# td\n")
            .iter()
            .all(|b| b.title != "td"));
        assert!(!mark_title_quoted(&task, "td", 0).unwrap());
        assert_eq!(std::fs::read_to_string(&task).unwrap(), "  $td\n# td\n");
    }

    #[test]
    fn test_quote_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("m.task");
        std::fs::write(&task, "$sp").unwrap();
        assert!(mark_title_quoted(&task, "sp", 0).unwrap());
        assert_eq!(std::fs::read_to_string(&task).unwrap(), "$\"sp\"");
    }

    #[test]
    fn test_unquote() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("m.task");
        std::fs::write(&task, "$\"opt\"\n# opt\n").unwrap();
        assert!(unquote_title(&task, "opt").unwrap());
        assert_eq!(std::fs::read_to_string(&task).unwrap(), "$opt\n# opt\n");
        assert!(!unquote_title(&task, "opt").unwrap());
    }

    #[test]
    fn test_pass_lock_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let first = PassLock::acquire(dir.path()).unwrap();
        assert!(first.path().ends_with(".tasker/lock"));
        assert!(matches!(
            PassLock::acquire(dir.path()),
            Err(EngineError::Locked { .. })
        ));
        drop(first);
        assert!(PassLock::acquire(dir.path()).is_ok());
    }
}
