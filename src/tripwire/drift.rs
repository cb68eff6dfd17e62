//! Drift detection: compare generated artifacts on disk to the hashes
//! recorded in the state sidecar.

use crate::core::types::{BlockStatus, StateFile};
use crate::tripwire::hasher;
use std::path::Path;

/// A single drift finding.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftFinding {
    pub block: String,
    pub artifact: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Check one artifact (path relative to `task_dir`) against its recorded hash.
pub fn check_artifact_drift(
    task_dir: &Path,
    block: &str,
    artifact: &str,
    expected_hash: &str,
) -> Option<DriftFinding> {
    let path = task_dir.join(artifact);
    let finding = |actual: String, detail: String| DriftFinding {
        block: block.to_string(),
        artifact: artifact.to_string(),
        expected_hash: expected_hash.to_string(),
        actual_hash: actual,
        detail,
    };

    if !path.exists() {
        return Some(finding(
            "MISSING".to_string(),
            format!("{} does not exist", artifact),
        ));
    }

    let actual = hasher::hash_file(&path).unwrap_or_else(|e| format!("ERROR:{}", e));
    if actual != expected_hash {
        Some(finding(actual, format!("{} content changed", artifact)))
    } else {
        None
    }
}

/// Check every artifact of every done block in a sidecar.
pub fn detect_drift(task_dir: &Path, state: &StateFile) -> Vec<DriftFinding> {
    let mut findings = Vec::new();
    for (title, bs) in &state.blocks {
        if bs.status != BlockStatus::Done {
            continue;
        }
        for (artifact, hash) in &bs.artifacts {
            if let Some(f) = check_artifact_drift(task_dir, title, artifact, hash) {
                findings.push(f);
            }
        }
    }
    findings
}
