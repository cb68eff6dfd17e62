//! Task directories in bulk from a molecule list.
//!
//! `<root>/smiles.txt` holds one `<identifier> <name>` pair per line, the
//! identifier being a SMILES string or CAS number. Each pair becomes
//! `<root>/<name>/` with a seed `<name>.com` and a `<name>.task`. Lines that
//! were turned into a directory are wrapped in double quotes, and quoted
//! lines are skipped on later runs.

use super::error::EngineError;
use super::state::write_atomic;
use crate::artifacts::gaussian;
use crate::geometry::MoleculeResolver;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the molecule list inside the batch root.
pub const LIST_FILE: &str = "smiles.txt";

/// One unprocessed line of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Zero-based line index
    pub line: usize,
    pub identifier: String,
    pub name: String,
}

/// Level of theory written into the default task chain and seed route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMethod {
    pub functional: String,
    pub basis: String,
    pub solvent: String,
}

impl Default for BatchMethod {
    fn default() -> Self {
        Self {
            functional: "wB97XD".to_string(),
            basis: "TZVP".to_string(),
            solvent: "water".to_string(),
        }
    }
}

impl BatchMethod {
    fn level(&self) -> String {
        format!(
            "{}/{} scrf=(solvent={})",
            self.functional, self.basis, self.solvent
        )
    }

    /// Ground-state optimisation, excited-state optimisation, absorption.
    pub fn task_text(&self, identifier: &str) -> String {
        let level = self.level();
        format!(
            "$opt\n%molecule={identifier}\n# opt freq {level}\n\n\
             $td\n%opt\n# opt td freq symm=veryloose {level}\n\n\
             $abs\n%opt\n# td {level}\n"
        )
    }

    /// Route of the seed `<name>.com`.
    pub fn seed_route(&self) -> String {
        format!("# {} opt freq", self.level())
    }
}

/// Outcome of [`build`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub created: Vec<PathBuf>,
    /// (name, reason) of entries left unprocessed
    pub failed: Vec<(String, String)>,
}

/// Unprocessed entries of a list. Blank and quoted lines are skipped; any
/// other line must be exactly two fields with a plain directory name.
pub fn parse_list(path: &Path, text: &str) -> Result<Vec<BatchEntry>, EngineError> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('"') {
            continue;
        }
        let invalid = |reason: String| EngineError::List {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [identifier, name] = parts.as_slice() else {
            return Err(invalid(format!("expected '<SMILES> <name>', got '{}'", line)));
        };
        if name.contains(['/', '\\']) || *name == "." || *name == ".." {
            return Err(invalid(format!("'{}' is not a directory name", name)));
        }
        entries.push(BatchEntry {
            line: idx,
            identifier: identifier.to_string(),
            name: name.to_string(),
        });
    }
    Ok(entries)
}

/// `text` with the given lines wrapped in double quotes.
pub fn mark_processed(text: &str, lines: &HashSet<usize>) -> String {
    let mut out: Vec<String> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if lines.contains(&idx) {
                format!("\"{}\"", line.trim())
            } else {
                line.to_string()
            }
        })
        .collect();
    if text.ends_with('\n') {
        out.push(String::new());
    }
    out.join("\n")
}

/// Create a task directory for every unprocessed list entry under `root`.
///
/// `task_body` replaces the default task chain when given. Entries whose
/// geometry cannot be resolved or whose task file already exists are
/// reported and left unquoted; the others are marked in the list.
pub fn build(
    root: &Path,
    method: &BatchMethod,
    task_body: Option<&str>,
    molecules: &dyn MoleculeResolver,
) -> Result<BatchReport, EngineError> {
    let list = root.join(LIST_FILE);
    let text = std::fs::read_to_string(&list)
        .map_err(|e| EngineError::Config(format!("cannot read {}: {}", list.display(), e)))?;
    let entries = parse_list(&list, &text)?;

    let mut report = BatchReport::default();
    let mut processed = HashSet::new();
    for entry in &entries {
        match create_task_dir(root, entry, method, task_body, molecules) {
            Ok(dir) => {
                info!("Created {} from {}", dir.display(), entry.identifier);
                processed.insert(entry.line);
                report.created.push(dir);
            }
            Err(e) => {
                warn!("{}: {}", entry.name, e);
                report.failed.push((entry.name.clone(), e.to_string()));
            }
        }
    }

    if !processed.is_empty() {
        write_atomic(&list, mark_processed(&text, &processed).as_bytes())
            .map_err(|e| EngineError::generation(&list, e))?;
    }
    Ok(report)
}

fn create_task_dir(
    root: &Path,
    entry: &BatchEntry,
    method: &BatchMethod,
    task_body: Option<&str>,
    molecules: &dyn MoleculeResolver,
) -> Result<PathBuf, EngineError> {
    let dir = root.join(&entry.name);
    let task_path = dir.join(format!("{}.task", entry.name));
    if task_path.exists() {
        return Err(EngineError::Config(format!(
            "{} already exists",
            task_path.display()
        )));
    }

    let mut record = molecules.resolve(&entry.identifier)?;
    record.solver_keywords = Some(method.seed_route());

    let com = dir.join(format!("{}.com", entry.name));
    write_atomic(&com, gaussian::render_seed_input(&entry.name, &record).as_bytes())
        .map_err(|e| EngineError::generation(&com, e))?;
    let body = task_body
        .map(str::to_string)
        .unwrap_or_else(|| method.task_text(&entry.identifier));
    write_atomic(&task_path, body.as_bytes())
        .map_err(|e| EngineError::generation(&task_path, e))?;
    Ok(dir)
}
