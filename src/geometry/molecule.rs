//! Molecular identifiers (SMILES or CAS numbers) → 3D geometry.
//!
//! CAS numbers are resolved to SMILES through PubChem; SMILES are embedded
//! and force-field minimised by the external Open Babel toolkit.

use super::{GeometryError, ReadError, StructureFile, XyzFile};
use crate::core::types::GeometryRecord;
use regex::Regex;
use serde::Deserialize;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static CAS_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,7}-\d{2}-\d$").expect("static regex"));

const PUBCHEM_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/name";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Force fields tried in order, with their step limits.
const FORCE_FIELDS: [(&str, u32); 2] = [("MMFF94", 2000), ("UFF", 1000)];

/// Resolves a molecular identifier to a geometry.
pub trait MoleculeResolver {
    fn resolve(&self, identifier: &str) -> Result<GeometryRecord, GeometryError>;
}

/// Whether `s` has the shape of a CAS registry number.
pub fn is_cas_number(s: &str) -> bool {
    CAS_NUMBER.is_match(s)
}

/// Net formal charge of a SMILES string: sum of bracket-atom charges.
pub fn formal_charge(smiles: &str) -> i32 {
    let mut total = 0;
    let mut rest = smiles;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        total += bracket_charge(&after[..close]);
        rest = &after[close + 1..];
    }
    total
}

fn bracket_charge(atom: &str) -> i32 {
    // Atom class (":n") never carries charge
    let atom = atom.split(':').next().unwrap_or("");
    let Some(pos) = atom.find(['+', '-']) else {
        return 0;
    };
    let tail = &atom[pos..];
    let sign = if tail.starts_with('+') { 1 } else { -1 };
    let sign_char = if sign > 0 { '+' } else { '-' };
    let digits: String = tail[1..].chars().take_while(char::is_ascii_digit).collect();
    let magnitude = if digits.is_empty() {
        i32::try_from(tail.chars().take_while(|&c| c == sign_char).count()).unwrap_or(0)
    } else {
        digits.parse().unwrap_or(0)
    };
    sign * magnitude
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PubChemResponse {
    property_table: PropertyTable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PropertyTable {
    properties: Vec<PubChemProperties>,
}

#[derive(Debug, Deserialize)]
struct PubChemProperties {
    #[serde(rename = "CanonicalSMILES", alias = "ConnectivitySMILES", alias = "SMILES")]
    smiles: String,
}

/// Open Babel + PubChem resolver.
#[derive(Debug, Clone)]
pub struct OpenBabelResolver {
    program: String,
}

impl OpenBabelResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Look up the SMILES of a CAS number on PubChem.
    pub fn smiles_for_cas(&self, cas: &str) -> Result<String, GeometryError> {
        let url = format!("{}/{}/property/CanonicalSMILES/JSON", PUBCHEM_URL, cas);
        info!("Resolving CAS {} via PubChem", cas);
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GeometryError::Toolkit(format!("HTTP client: {}", e)))?;
        let response: PubChemResponse = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| GeometryError::Toolkit(format!("PubChem lookup for {}: {}", cas, e)))?;
        response
            .property_table
            .properties
            .into_iter()
            .next()
            .map(|p| p.smiles)
            .ok_or_else(|| GeometryError::Toolkit(format!("no SMILES for CAS {}", cas)))
    }

    /// Embed a SMILES in 3D, trying each force field in turn.
    pub fn embed(&self, smiles: &str) -> Result<GeometryRecord, GeometryError> {
        let mut last_error = String::new();
        for (ff, steps) in FORCE_FIELDS {
            match self.run_obabel(smiles, ff, steps) {
                Ok(mut record) => {
                    record.charge = formal_charge(smiles);
                    record.spin_multiplicity = 1;
                    return Ok(record);
                }
                Err(e) => {
                    warn!("{} embedding of {} failed: {}", ff, smiles, e);
                    last_error = e;
                }
            }
        }
        Err(GeometryError::Toolkit(format!(
            "cannot embed {}: {}",
            smiles, last_error
        )))
    }

    fn run_obabel(&self, smiles: &str, ff: &str, steps: u32) -> Result<GeometryRecord, String> {
        debug!("{} -:{} --gen3d --ff {} --steps {}", self.program, smiles, ff, steps);
        let output = Command::new(&self.program)
            .arg(format!("-:{}", smiles))
            .args(["-oxyz", "--gen3d", "-h", "--minimize", "--ff", ff, "--steps"])
            .arg(steps.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| format!("failed to spawn {}: {}", self.program, e))?;

        if !output.status.success() {
            return Err(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        XyzFile::read_from(&mut output.stdout.as_slice()).map_err(|e| match e {
            ReadError::Io(e) => e.to_string(),
            ReadError::Malformed(reason) => format!("unusable output: {}", reason),
        })
    }
}

impl MoleculeResolver for OpenBabelResolver {
    fn resolve(&self, identifier: &str) -> Result<GeometryRecord, GeometryError> {
        let smiles = if is_cas_number(identifier) {
            let s = self.smiles_for_cas(identifier)?;
            info!("CAS {} converted to SMILES: {}", identifier, s);
            s
        } else {
            identifier.to_string()
        };
        self.embed(&smiles)
    }
}
