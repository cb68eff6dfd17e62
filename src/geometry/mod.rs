//! Geometry collaborators: structure-file readers and molecular identifiers.
//!
//! Every reader produces a [`GeometryRecord`]: charge, spin multiplicity and
//! `"{element} {x} {y} {z}"` coordinate lines, plus the route section when the
//! source is a finished solver log.

pub mod elements;
pub mod gaussian_input;
pub mod gaussian_log;
pub mod molecule;
pub mod xyz;

use crate::core::types::GeometryRecord;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use gaussian_input::GaussianInputFile;
pub use gaussian_log::GaussianLogFile;
pub use molecule::{MoleculeResolver, OpenBabelResolver};
pub use xyz::XyzFile;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("structure file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported structure format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("malformed structure file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("molecule toolkit failed: {0}")]
    Toolkit(String),
}

/// Format-level read failure, before the path is known.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Malformed(String),
}

/// A structure-file format that yields a [`GeometryRecord`].
pub trait StructureFile {
    /// Parse a record from a buffered reader.
    fn read_from(reader: &mut impl BufRead) -> Result<GeometryRecord, ReadError>;

    /// Parse a record from a file path.
    fn read_from_path(path: &Path) -> Result<GeometryRecord, GeometryError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GeometryError::NotFound {
                path: path.to_path_buf(),
            },
            _ => GeometryError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader).map_err(|e| match e {
            ReadError::Io(source) => GeometryError::Io {
                path: path.to_path_buf(),
                source,
            },
            ReadError::Malformed(reason) => GeometryError::Malformed {
                path: path.to_path_buf(),
                reason,
            },
        })
    }
}

/// Structure format selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Xyz,
    GaussianInput,
    GaussianLog,
}

impl StructureFormat {
    pub fn from_path(path: &Path) -> Result<Self, GeometryError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xyz" => Ok(Self::Xyz),
            "gjf" | "com" => Ok(Self::GaussianInput),
            "log" | "out" => Ok(Self::GaussianLog),
            _ => Err(GeometryError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Read a geometry from any supported structure file.
pub fn read_geometry(path: &Path) -> Result<GeometryRecord, GeometryError> {
    match StructureFormat::from_path(path)? {
        StructureFormat::Xyz => XyzFile::read_from_path(path),
        StructureFormat::GaussianInput => GaussianInputFile::read_from_path(path),
        StructureFormat::GaussianLog => GaussianLogFile::read_from_path(path),
    }
}

/// Split a coordinate row into `"{element} {x} {y} {z}"` when it has the
/// shape of one.
pub(crate) fn coordinate_line(element: &str, xyz: [&str; 3]) -> Option<String> {
    if xyz.iter().all(|v| v.parse::<f64>().is_ok()) {
        Some(format!("{} {} {} {}", element, xyz[0], xyz[1], xyz[2]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            StructureFormat::from_path(Path::new("a.xyz")).unwrap(),
            StructureFormat::Xyz
        );
        assert_eq!(
            StructureFormat::from_path(Path::new("a.COM")).unwrap(),
            StructureFormat::GaussianInput
        );
        assert_eq!(
            StructureFormat::from_path(Path::new("dir/a.log")).unwrap(),
            StructureFormat::GaussianLog
        );
        assert!(matches!(
            StructureFormat::from_path(Path::new("a.pdb")),
            Err(GeometryError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_read_geometry_not_found() {
        let result = read_geometry(Path::new("/nonexistent/base.gjf"));
        assert!(matches!(result, Err(GeometryError::NotFound { .. })));
    }

    #[test]
    fn test_read_geometry_malformed_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xyz");
        std::fs::write(&path, "1\n").unwrap();
        let err = read_geometry(&path).unwrap_err();
        assert!(matches!(err, GeometryError::Malformed { .. }));
        assert!(err.to_string().contains("bad.xyz"));
    }

    #[test]
    fn test_coordinate_line() {
        assert_eq!(
            coordinate_line("C", ["0.0", "-1.5", "2"]).as_deref(),
            Some("C 0.0 -1.5 2")
        );
        assert!(coordinate_line("C", ["x", "0", "0"]).is_none());
    }
}
