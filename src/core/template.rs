//! `@txt=` task-file templates.
//!
//! A task file whose entire content is a single `@txt=<name-or-path>` line is
//! replaced in place by the named template before parsing.

use super::config::expand_home;
use super::error::TemplateError;
use super::state::write_atomic;
use std::path::{Path, PathBuf};

const DIRECTIVE: &str = "@txt=";

/// Template reference of a single-line `@txt=` task file, if any.
pub fn parse_directive(content: &str) -> Option<&str> {
    let content = content.trim();
    if content.contains('\n') {
        return None;
    }
    content
        .strip_prefix(DIRECTIVE)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Locate a template: an explicit path, else `<dir>/<name>` then `<dir>/<name>.txt`.
pub fn find_template(name: &str, templates_dir: &Path) -> Result<PathBuf, TemplateError> {
    let candidates: Vec<PathBuf> = if name.contains('/') {
        vec![expand_home(name)]
    } else {
        vec![
            templates_dir.join(name),
            templates_dir.join(format!("{}.txt", name)),
        ]
    };
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| TemplateError::NotFound {
            name: name.to_string(),
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Read a template, rejecting empty ones.
pub fn read_template(path: &Path) -> Result<String, TemplateError> {
    let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Err(TemplateError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(content)
}

/// Expand a `@txt=` task file in place. Returns the template used, or None
/// when the file is an ordinary task file.
pub fn expand_task_file(
    task_file: &Path,
    templates_dir: &Path,
) -> Result<Option<PathBuf>, TemplateError> {
    let content = std::fs::read_to_string(task_file).map_err(|e| TemplateError::Io {
        path: task_file.to_path_buf(),
        source: e,
    })?;
    let Some(name) = parse_directive(&content) else {
        return Ok(None);
    };

    let template = find_template(name, templates_dir)?;
    let body = read_template(&template)?;
    write_atomic(task_file, body.as_bytes()).map_err(|e| TemplateError::Io {
        path: task_file.to_path_buf(),
        source: e,
    })?;
    tracing::info!(
        "Imported template {} into {}",
        template.display(),
        task_file.display()
    );
    Ok(Some(template))
}
