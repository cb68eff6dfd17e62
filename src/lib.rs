//! tasker: dependency-aware quantum-chemistry input generation.
//!
//! A pass reads each `.task` file, decides which blocks are ready, writes
//! solver inputs and post-processing scripts for them, and marks them done.
//! The engine never runs a solver.

pub mod artifacts;
pub mod cli;
pub mod core;
pub mod directives;
pub mod geometry;
pub mod tripwire;
