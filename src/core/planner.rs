//! Readiness assessment: decide per block whether to generate, wait, or skip.
//!
//! Pure with respect to durable state (task file, sidecar, solver logs); the
//! `plan` command and the engine share it.

use super::state;
use super::types::{
    BlockStatus, PlannedBlock, Readiness, Source, StateFile, TaskBlock, TaskFile, TaskPlan,
};
use crate::geometry::gaussian_log;
use std::path::{Path, PathBuf};

/// Everything readiness depends on.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub task_dir: &'a Path,
    pub task: &'a TaskFile,
    pub state: Option<&'a StateFile>,
    pub termination_marker: &'a str,
}

/// Solver log of a block: `<task_dir>/<title>/<title>_<base>.log`.
pub fn log_path(task_dir: &Path, title: &str, base_name: &str) -> PathBuf {
    task_dir
        .join(title)
        .join(format!("{}_{}.log", title, base_name))
}

/// Readiness of one block.
pub fn assess(block: &TaskBlock, ctx: &PlanContext<'_>) -> Readiness {
    if block.completed
        || state::is_recorded_done(ctx.state, &block.title, &block.definition_hash)
    {
        return Readiness::SkipDone {
            commands_pending: commands_pending(block, ctx.state),
        };
    }

    if block.has_override() {
        return Readiness::RunOrigin;
    }

    match &block.source {
        Source::Origin => Readiness::RunOrigin,
        Source::Restart => {
            let log = log_path(ctx.task_dir, &block.title, &ctx.task.base_name);
            if log.is_file() {
                Readiness::RunRestart
            } else {
                Readiness::SkipUnready {
                    reason: format!("no previous run to restart from ({})", log.display()),
                }
            }
        }
        Source::Block(src) if *src == block.title => Readiness::SkipUnready {
            reason: "block names itself as source".to_string(),
        },
        Source::Block(src) if ctx.task.block(src).is_none() => Readiness::SkipUnready {
            reason: format!("unknown source block '{}'", src),
        },
        Source::Block(src) => {
            let log = log_path(ctx.task_dir, src, &ctx.task.base_name);
            if !log.is_file() {
                Readiness::SkipUnready {
                    reason: format!("waiting for {}", log.display()),
                }
            } else if !gaussian_log::is_normal_termination(&log, ctx.termination_marker) {
                Readiness::SkipUnready {
                    reason: format!("{} has not terminated normally", log.display()),
                }
            } else {
                Readiness::RunChained {
                    source: src.clone(),
                }
            }
        }
    }
}

/// Post commands exist and the sidecar records generation but not emission.
fn commands_pending(block: &TaskBlock, state: Option<&StateFile>) -> bool {
    if block.post_commands.is_empty() {
        return false;
    }
    state
        .and_then(|s| s.blocks.get(&block.title))
        .is_some_and(|bs| bs.status == BlockStatus::Done && !bs.commands_emitted)
}

/// Readiness of every block, in file order.
pub fn plan(ctx: &PlanContext<'_>) -> TaskPlan {
    let mut blocks = Vec::new();
    let mut to_run = 0u32;
    let mut done = 0u32;
    let mut unready = 0u32;

    for block in &ctx.task.blocks {
        let readiness = assess(block, ctx);
        if readiness.runs() {
            to_run += 1;
        } else if let Readiness::SkipDone { .. } = readiness {
            done += 1;
        } else {
            unready += 1;
        }
        blocks.push(PlannedBlock {
            title: block.title.clone(),
            readiness,
        });
    }

    TaskPlan {
        task_file: ctx.task.path.clone(),
        blocks,
        to_run,
        done,
        unready,
    }
}
