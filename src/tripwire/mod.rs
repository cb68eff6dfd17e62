//! Tripwire: BLAKE3 hashing, event log, artifact drift detection.

pub mod drift;
pub mod eventlog;
pub mod hasher;
