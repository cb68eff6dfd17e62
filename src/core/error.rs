//! Error taxonomy for the engine.
//!
//! Every variant is caught at the task-directory boundary; nothing here ever
//! stops a pass over sibling directories.

use crate::geometry::GeometryError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot read task file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("block '{block}' is not ready: {reason}")]
    Readiness { block: String, reason: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("cannot write {}: {source}", path.display())]
    Generation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("block '{block}' has no keywords and no carried-over route section")]
    MissingKeywords { block: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("state error: {0}")]
    State(String),

    #[error("task directory {} is locked by another pass", path.display())]
    Locked { path: PathBuf },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{}:{line}: {reason}", path.display())]
    List {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl EngineError {
    pub fn generation(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Generation {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{name}' not found (searched: {searched})")]
    NotFound { name: String, searched: String },

    #[error("template {} is empty", path.display())]
    Empty { path: PathBuf },

    #[error("required field '{field}' missing: {context}")]
    MissingField { field: &'static str, context: String },

    #[error("cannot read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
