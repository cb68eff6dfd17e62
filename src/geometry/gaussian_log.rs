//! Gaussian output log: final geometry, charge/multiplicity, route section,
//! and the normal-termination check.

use super::{coordinate_line, elements, ReadError, StructureFile};
use crate::core::types::GeometryRecord;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;

static CHARGE_MULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Charge\s*=\s*(-?\d+)\s+Multiplicity\s*=\s*(\d+)").expect("static regex")
});

const ORIENTATION_HEADERS: [&str; 2] = ["Standard orientation", "Input orientation"];
const ROWS_BELOW_HEADER: usize = 5;
const TAIL_WINDOW: u64 = 4096;

pub struct GaussianLogFile;

impl StructureFile for GaussianLogFile {
    fn read_from(reader: &mut impl BufRead) -> Result<GeometryRecord, ReadError> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let coordinates = ORIENTATION_HEADERS
            .iter()
            .find_map(|header| last_orientation_block(&lines, header))
            .ok_or_else(|| ReadError::Malformed("no orientation block".to_string()))?;
        if coordinates.is_empty() {
            return Err(ReadError::Malformed("empty orientation block".to_string()));
        }

        let (charge, spin_multiplicity) = lines
            .iter()
            .find_map(|line| {
                let caps = CHARGE_MULT.captures(line)?;
                Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
            })
            .ok_or_else(|| ReadError::Malformed("no Charge/Multiplicity line".to_string()))?;

        Ok(GeometryRecord {
            charge,
            spin_multiplicity,
            coordinates,
            solver_keywords: route_section(&lines),
        })
    }
}

/// Coordinates of the last block under `header`, or None when absent.
fn last_orientation_block(lines: &[String], header: &str) -> Option<Vec<String>> {
    let start = lines.iter().rposition(|l| l.contains(header))?;
    let coordinates = lines
        .iter()
        .skip(start + ROWS_BELOW_HEADER)
        .take_while(|l| !l.contains("----"))
        .filter_map(|l| {
            let parts: Vec<&str> = l.split_whitespace().collect();
            if parts.len() < 6 {
                return None;
            }
            let element = elements::symbol_for_token(parts[1]);
            coordinate_line(&element, [parts[3], parts[4], parts[5]])
        })
        .collect();
    Some(coordinates)
}

/// Route section: the first `#` line joined with its continuation lines.
fn route_section(lines: &[String]) -> Option<String> {
    let start = lines.iter().position(|l| l.trim_start().starts_with('#'))?;
    let mut route = lines[start].trim().to_string();
    for line in &lines[start + 1..] {
        let t = line.trim();
        if t.starts_with("----") {
            break;
        }
        route.push_str(t);
    }
    Some(route)
}

/// Last non-empty line of a file, reading backwards from the end.
pub fn last_nonempty_line(path: &Path) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut window = TAIL_WINDOW.min(len);
    loop {
        file.seek(SeekFrom::Start(len - window))?;
        let mut buf = Vec::new();
        (&mut file).take(window).read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf);
        // First line may be cut off unless the window reaches the file start
        let skip = usize::from(window < len);
        if let Some(line) = text
            .lines()
            .skip(skip)
            .filter(|l| !l.trim().is_empty())
            .last()
        {
            return Ok(Some(line.trim().to_string()));
        }
        if window == len {
            return Ok(None);
        }
        window = (window * 2).min(len);
    }
}

/// Whether the log's last non-empty line contains `marker`.
pub fn is_normal_termination(path: &Path, marker: &str) -> bool {
    match last_nonempty_line(path) {
        Ok(Some(line)) => line.contains(marker),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal log fragment with one optimisation step and a final geometry.
    pub(crate) fn sample_log(terminated: bool) -> String {
        let mut s = String::from(
            " Entering Gaussian System\n\
             ------------------------\n\
             # opt b3lyp/6-31g(d)\n\
             geom=connectivity\n\
             ------------------------\n\
             Symbolic Z-matrix:\n\
             Charge =  0 Multiplicity = 1\n\
                                   Standard orientation:\n\
             ---------------------------------------------------------------------\n\
             Center     Atomic      Atomic             Coordinates (Angstroms)\n\
             Number     Number       Type             X           Y           Z\n\
             ---------------------------------------------------------------------\n\
                  1          6           0        0.100000    0.000000    0.000000\n\
             ---------------------------------------------------------------------\n\
                                   Standard orientation:\n\
             ---------------------------------------------------------------------\n\
             Center     Atomic      Atomic             Coordinates (Angstroms)\n\
             Number     Number       Type             X           Y           Z\n\
             ---------------------------------------------------------------------\n\
                  1          6           0        0.000000    0.000000    0.000000\n\
                  2          1           0        0.000000    0.000000    1.090000\n\
             ---------------------------------------------------------------------\n",
        );
        if terminated {
            s.push_str(" Normal termination of Gaussian 16 at Mon Feb 16 14:00:00 2026.\n\n");
        }
        s
    }

    fn parse(text: &str) -> Result<GeometryRecord, ReadError> {
        GaussianLogFile::read_from(&mut text.as_bytes())
    }

    #[test]
    fn test_last_standard_orientation() {
        let r = parse(&sample_log(true)).unwrap();
        assert_eq!(
            r.coordinates,
            vec!["C 0.000000 0.000000 0.000000", "H 0.000000 0.000000 1.090000"]
        );
        assert_eq!((r.charge, r.spin_multiplicity), (0, 1));
    }

    #[test]
    fn test_route_section_joined() {
        let r = parse(&sample_log(true)).unwrap();
        assert_eq!(
            r.solver_keywords.as_deref(),
            Some("# opt b3lyp/6-31g(d)geom=connectivity")
        );
    }

    #[test]
    fn test_input_orientation_fallback() {
        let log = sample_log(false).replace("Standard orientation", "Input orientation");
        let r = parse(&log).unwrap();
        assert_eq!(r.coordinates.len(), 2);
    }

    #[test]
    fn test_negative_charge() {
        let log = sample_log(false).replace("Charge =  0 Multiplicity = 1", "Charge = -1 Multiplicity = 2");
        let r = parse(&log).unwrap();
        assert_eq!((r.charge, r.spin_multiplicity), (-1, 2));
    }

    #[test]
    fn test_no_orientation() {
        assert!(matches!(
            parse(" Charge = 0 Multiplicity = 1\n"),
            Err(ReadError::Malformed(_))
        ));
    }

    #[test]
    fn test_termination_check() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done.log");
        let running = dir.path().join("running.log");
        std::fs::write(&done, sample_log(true)).unwrap();
        std::fs::write(&running, sample_log(false)).unwrap();
        assert!(is_normal_termination(&done, "Normal termination"));
        assert!(!is_normal_termination(&running, "Normal termination"));
        assert!(!is_normal_termination(
            &dir.path().join("absent.log"),
            "Normal termination"
        ));
    }

    #[test]
    fn test_last_nonempty_line_long_trailing_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.log");
        let mut text = "x".repeat(10_000);
        text.push_str("\n Normal termination of Gaussian\n");
        text.push_str(&"\n".repeat(9_000));
        std::fs::write(&path, &text).unwrap();
        assert_eq!(
            last_nonempty_line(&path).unwrap().as_deref(),
            Some("Normal termination of Gaussian")
        );
    }

    #[test]
    fn test_last_nonempty_line_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        std::fs::write(&path, "").unwrap();
        assert_eq!(last_nonempty_line(&path).unwrap(), None);
    }
}
