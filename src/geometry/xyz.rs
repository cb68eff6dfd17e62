//! XYZ files: atom count, comment line, coordinate rows.
//!
//! The comment line may carry `<charge> <mult>` or `charge=<c> spin=<m>`;
//! anything else means charge 0, singlet.

use super::{coordinate_line, ReadError, StructureFile};
use crate::core::types::GeometryRecord;
use std::io::BufRead;

pub struct XyzFile;

impl StructureFile for XyzFile {
    fn read_from(reader: &mut impl BufRead) -> Result<GeometryRecord, ReadError> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        if lines.len() < 3 {
            return Err(ReadError::Malformed(format!(
                "expected at least 3 lines, found {}",
                lines.len()
            )));
        }

        let (charge, spin_multiplicity) = parse_comment(&lines[1]).unwrap_or((0, 1));
        let coordinates: Vec<String> = lines[2..]
            .iter()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts.as_slice() {
                    [el, x, y, z] => coordinate_line(el, [*x, *y, *z]),
                    _ => None,
                }
            })
            .collect();
        if coordinates.is_empty() {
            return Err(ReadError::Malformed("no coordinate rows".to_string()));
        }

        Ok(GeometryRecord {
            charge,
            spin_multiplicity,
            coordinates,
            solver_keywords: None,
        })
    }
}

fn parse_comment(line: &str) -> Option<(i32, u32)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if let [c, m] = parts.as_slice() {
        if let (Ok(c), Ok(m)) = (c.parse(), m.parse()) {
            return Some((c, m));
        }
    }
    let mut charge = None;
    let mut spin = None;
    for part in parts {
        if let Some(v) = part.strip_prefix("charge=") {
            charge = v.parse().ok();
        } else if let Some(v) = part.strip_prefix("spin=") {
            spin = v.parse().ok();
        }
    }
    Some((charge?, spin?))
}

/// Render a minimal xyz: count, `comment`, coordinate rows.
pub fn render_xyz(record: &GeometryRecord, comment: &str) -> String {
    let mut out = format!("{}\n{}\n", record.coordinates.len(), comment);
    for line in &record.coordinates {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// `charge=<c> spin=<m>` comment line.
pub fn charge_spin_comment(record: &GeometryRecord) -> String {
    format!(
        "charge={} spin={}",
        record.charge, record.spin_multiplicity
    )
}
