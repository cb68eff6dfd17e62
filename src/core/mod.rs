//! Core engine logic: types, parsing, expansion, readiness, state and execution.

pub mod batch;
pub mod codegen;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod keywords;
pub mod parser;
pub mod planner;
pub mod state;
pub mod template;
pub mod types;
