//! Gaussian input (`.gjf` / `.com`) geometry reader.

use super::{coordinate_line, ReadError, StructureFile};
use crate::core::types::GeometryRecord;
use regex::Regex;
use std::io::BufRead;
use std::sync::LazyLock;

static CHARGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)\s+(\d+)").expect("static regex"));

pub struct GaussianInputFile;

impl StructureFile for GaussianInputFile {
    fn read_from(reader: &mut impl BufRead) -> Result<GeometryRecord, ReadError> {
        let mut charge_spin: Option<(i32, u32)> = None;
        let mut coordinates = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.starts_with("Lp") {
                continue;
            }
            if charge_spin.is_some() {
                if line.trim().is_empty() {
                    break;
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                let row = match parts.as_slice() {
                    [el, x, y, z] => coordinate_line(el, [*x, *y, *z]),
                    // element, freeze flag, x, y, z
                    [el, _, x, y, z] => coordinate_line(el, [*x, *y, *z]),
                    _ => None,
                };
                coordinates.extend(row);
            } else if let Some(caps) = CHARGE_LINE.captures(&line) {
                let charge = caps[1]
                    .parse()
                    .map_err(|_| ReadError::Malformed(format!("bad charge in '{}'", line)))?;
                let mult = caps[2]
                    .parse()
                    .map_err(|_| ReadError::Malformed(format!("bad multiplicity in '{}'", line)))?;
                charge_spin = Some((charge, mult));
            }
        }

        let (charge, spin_multiplicity) = charge_spin
            .ok_or_else(|| ReadError::Malformed("no charge/multiplicity line".to_string()))?;
        if coordinates.is_empty() {
            return Err(ReadError::Malformed(
                "no coordinates after charge/multiplicity line".to_string(),
            ));
        }

        Ok(GeometryRecord {
            charge,
            spin_multiplicity,
            coordinates,
            solver_keywords: None,
        })
    }
}
