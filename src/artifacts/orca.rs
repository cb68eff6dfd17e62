//! Secondary-solver (ORCA) inputs rendered from placeholder templates.
//!
//! A template `<dir>/<job>.inp` has a body, then optionally a `-default-`
//! line followed by `key=value` defaults. `[key]` placeholders in the body
//! are filled from the defaults, overridden by the block's control pairs.

use super::{write_artifact, Artifact};
use crate::core::error::{EngineError, TemplateError};
use crate::core::types::{GeometryRecord, SecondaryBlock};
use crate::geometry::xyz::{charge_spin_comment, render_xyz};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULTS_MARKER: &str = "-default-";

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrcaTemplate {
    pub body: Vec<String>,
    pub defaults: IndexMap<String, String>,
}

impl OrcaTemplate {
    pub fn parse(text: &str) -> Self {
        let mut body = Vec::new();
        let mut defaults = IndexMap::new();
        let mut in_defaults = false;

        for line in text.lines() {
            if line.trim() == DEFAULTS_MARKER {
                in_defaults = true;
                continue;
            }
            if in_defaults {
                if let Some((k, v)) = line.trim().split_once('=') {
                    defaults.insert(k.trim().to_string(), v.trim().to_string());
                }
            } else {
                body.push(line.trim_end().to_string());
            }
        }

        Self { body, defaults }
    }

    /// Whether the body holds anything but blank lines.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(|l| l.trim().is_empty())
    }

    /// Substitute `params` into the body, then `[charge]` and `[spin]`.
    pub fn render(&self, params: &IndexMap<String, String>, charge: i32, spin: u32) -> String {
        let charge = charge.to_string();
        let spin = spin.to_string();
        let mut out = String::new();
        for line in &self.body {
            let mut line = line.clone();
            for (key, value) in params {
                line = line.replace(&format!("[{}]", key), value);
            }
            line = line.replace("[charge]", &charge).replace("[spin]", &spin);
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Defaults overridden by `control`, plus `xyz_file`.
    pub fn params(
        &self,
        control: &IndexMap<String, String>,
        xyz_file: &str,
    ) -> IndexMap<String, String> {
        let mut params = self.defaults.clone();
        for (k, v) in control {
            params.insert(k.clone(), v.clone());
        }
        params.insert("xyz_file".to_string(), xyz_file.to_string());
        params
    }
}

/// Templates loaded on first use and cached by name.
#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    cache: HashMap<String, OrcaTemplate>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, job: &str) -> Result<&OrcaTemplate, TemplateError> {
        if !self.cache.contains_key(job) {
            let path = self.dir.join(format!("{}.inp", job));
            if !path.is_file() {
                return Err(TemplateError::NotFound {
                    name: job.to_string(),
                    searched: path.display().to_string(),
                });
            }
            let text = std::fs::read_to_string(&path).map_err(|e| TemplateError::Io {
                path: path.clone(),
                source: e,
            })?;
            let template = OrcaTemplate::parse(&text);
            if template.is_empty() {
                return Err(TemplateError::Empty { path });
            }
            tracing::debug!("loaded ORCA template {}", path.display());
            self.cache.insert(job.to_string(), template);
        }
        self.cache
            .get(job)
            .ok_or_else(|| TemplateError::NotFound {
                name: job.to_string(),
                searched: self.dir.display().to_string(),
            })
    }
}

fn xyz_name(title: &str, base_name: &str) -> String {
    format!("{}_{}.xyz", title, base_name)
}

fn inp_name(title: &str) -> String {
    format!("{}.inp", title)
}

/// Files a previous run may have left: input, coordinates and solver log.
pub fn prior_outputs(output_dir: &Path, title: &str, base_name: &str) -> Vec<PathBuf> {
    vec![
        output_dir.join(inp_name(title)),
        output_dir.join(xyz_name(title, base_name)),
        output_dir.join(format!("{}_{}.log", title, base_name)),
    ]
}

/// The template named by the block's `job` control pair.
pub fn resolve_template<'a>(
    title: &str,
    secondary: &SecondaryBlock,
    store: &'a mut TemplateStore,
) -> Result<&'a OrcaTemplate, TemplateError> {
    let job = secondary.job().ok_or_else(|| TemplateError::MissingField {
        field: "job",
        context: format!("control line of block '{}'", title),
    })?;
    store.get(job)
}

/// Write `<title>_<base>.xyz` and `<title>.inp` into `output_dir`.
pub fn generate(
    title: &str,
    secondary: &SecondaryBlock,
    base_name: &str,
    output_dir: &Path,
    record: &GeometryRecord,
    store: &mut TemplateStore,
) -> Result<Vec<Artifact>, EngineError> {
    let template = resolve_template(title, secondary, store)?;

    let xyz_file = xyz_name(title, base_name);
    let comment = charge_spin_comment(record);
    let xyz = write_artifact(&output_dir.join(&xyz_file), &render_xyz(record, &comment))?;

    let params = template.params(&secondary.control, &xyz_file);
    let body = template.render(&params, record.charge, record.spin_multiplicity);
    let inp_path = output_dir.join(inp_name(title));
    let inp = write_artifact(&inp_path, &body)?;
    tracing::info!("Generated ORCA input {}", inp_path.display());

    Ok(vec![xyz, inp])
}
