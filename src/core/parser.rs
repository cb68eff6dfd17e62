//! Task file parsing.
//!
//! Line-oriented grammar, one block per blank-line-separated paragraph:
//! - `$title` / `$"title"` at column 0 starts a block (quoted = completed)
//! - `%origin`, `%restart`, `%<block>` select the geometry source
//! - `%molecule=` / `%smiles=` and `%file=` override the geometry
//! - `#...` route keywords (verbatim), `add =...` trailing input
//! - `!a b c` post-processing command words
//! - `-secondary-` / `-orca-` switches to the templated solver sub-block
//!
//! Unrecognized lines are ignored.

use super::error::EngineError;
use super::types::{SecondaryBlock, Source, TaskBlock, TaskFile, Variant};
use crate::tripwire::hasher;
use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const SECONDARY_MARKERS: [&str; 2] = ["-secondary-", "-orca-"];

static CONTROL_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=(\S+)").expect("static regex"));

/// Parse a `.task` file from disk.
pub fn parse_task_file(path: &Path) -> Result<TaskFile, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(TaskFile {
        path: path.to_path_buf(),
        base_name,
        blocks: parse_blocks(&content),
    })
}

/// Parse task blocks from text.
pub fn parse_blocks(text: &str) -> Vec<TaskBlock> {
    let mut blocks = Vec::new();
    let mut current = BlockBuilder::new(0);

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line.is_empty() {
            if let Some(block) = current.finish(idx) {
                blocks.push(block);
            }
            current = BlockBuilder::new(idx + 1);
            continue;
        }
        current.push(idx, line);
    }
    if let Some(block) = current.finish(text.lines().count()) {
        blocks.push(block);
    }

    blocks
}

/// Parse `key=value` pairs from a secondary-solver control line.
pub fn parse_control_pairs(text: &str) -> IndexMap<String, String> {
    CONTROL_PAIR
        .captures_iter(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Split a `$...` title into (title, quoted).
pub fn parse_title(rest: &str) -> (String, bool) {
    let rest = rest.trim();
    match rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => (inner.trim().to_string(), true),
        None => (rest.to_string(), false),
    }
}

/// Accumulates one block's lines.
struct BlockBuilder {
    start: usize,
    title: Option<String>,
    title_line: usize,
    completed: bool,
    source: Option<Source>,
    keyword_template: Option<String>,
    extra_keywords: Option<String>,
    post_commands: Vec<String>,
    molecule_override: Option<String>,
    file_override: Option<String>,
    secondary: Option<SecondaryBlock>,
    hashed_lines: Vec<String>,
}

impl BlockBuilder {
    fn new(start: usize) -> Self {
        Self {
            start,
            title: None,
            title_line: start,
            completed: false,
            source: None,
            keyword_template: None,
            extra_keywords: None,
            post_commands: Vec::new(),
            molecule_override: None,
            file_override: None,
            secondary: None,
            hashed_lines: Vec::new(),
        }
    }

    fn push(&mut self, idx: usize, line: &str) {
        if let Some(rest) = line.strip_prefix('$') {
            let (title, quoted) = parse_title(rest);
            self.hashed_lines.push(format!("${}", title));
            self.title = Some(title);
            self.completed = quoted;
            self.title_line = idx;
            return;
        }
        self.hashed_lines.push(line.to_string());

        if SECONDARY_MARKERS.contains(&line) {
            self.secondary = Some(SecondaryBlock::default());
            return;
        }

        if self.secondary.is_some() {
            if let Some(rest) = line.strip_prefix('%') {
                self.apply_percent(rest);
            }
            if let Some(sec) = self.secondary.as_mut() {
                if let Some(rest) = line.strip_prefix('#') {
                    sec.control = parse_control_pairs(rest);
                }
                sec.body.push(line.to_string());
            }
            return;
        }

        if let Some(rest) = line.strip_prefix('%') {
            self.apply_percent(rest);
        } else if let Some(rest) = line.strip_prefix('!') {
            self.post_commands = rest.split_whitespace().map(str::to_string).collect();
        } else if let Some(rest) = line.strip_prefix('#') {
            self.keyword_template = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("add =") {
            self.extra_keywords = Some(rest.trim().replace("\\n", "\n"));
        }
    }

    fn apply_percent(&mut self, rest: &str) {
        if let Some(id) = rest
            .strip_prefix("molecule=")
            .or_else(|| rest.strip_prefix("smiles="))
        {
            self.molecule_override = Some(id.trim().to_string());
        } else if let Some(path) = rest.strip_prefix("file=") {
            self.file_override = Some(path.trim().to_string());
            if self.source.is_none() {
                self.source = Some(Source::Origin);
            }
        } else {
            let name = rest.trim();
            if !name.is_empty() {
                self.source = Some(Source::from_name(name));
            }
        }
    }

    fn finish(self, end: usize) -> Option<TaskBlock> {
        let title = self.title.filter(|t| !t.is_empty())?;
        let definition_hash = hasher::hash_string(&self.hashed_lines.join("\n"));
        Some(TaskBlock {
            title,
            completed: self.completed,
            source: self.source.unwrap_or(Source::Origin),
            variant: match self.secondary {
                Some(sec) => Variant::Secondary(sec),
                None => Variant::Primary,
            },
            keyword_template: self.keyword_template,
            extra_keywords: self.extra_keywords,
            post_commands: self.post_commands,
            molecule_override: self.molecule_override,
            file_override: self.file_override,
            lines: self.start..end,
            title_line: self.title_line,
            definition_hash,
        })
    }
}
