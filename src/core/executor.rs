//! Engine pass over task directories.
//!
//! Per directory: lock → template import → parse → load sidecar → for each
//! block in file order: assess → geometry → artifacts → sidecar → quote →
//! commands. Failures stay inside their block; sibling blocks and sibling
//! directories continue.

use super::codegen;
use super::config::Config;
use super::discovery::{self, TaskDir};
use super::error::EngineError;
use super::parser;
use super::planner::{self, PlanContext};
use super::state::{self, PassLock};
use super::template;
use super::types::{
    BlockStatus, GeometryRecord, PassResult, Readiness, StateFile, TaskBlock, TaskEvent, TaskFile,
    Variant,
};
use crate::artifacts::{self, gaussian, orca, Artifact};
use crate::geometry::{self, GeometryError, MoleculeResolver, OpenBabelResolver};
use crate::tripwire::eventlog;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one block in a pass.
enum BlockOutcome {
    Generated,
    Skipped,
    Failed,
}

/// The input-generation engine.
pub struct Engine {
    config: Config,
    molecules: Box<dyn MoleculeResolver>,
    templates: orca::TemplateStore,
    /// Events of the directory being processed, written when the pass ends
    events: Vec<TaskEvent>,
    span: tracing::Span,
}

impl Engine {
    /// Engine with the default molecular-identifier resolver.
    pub fn new(config: Config) -> Self {
        let resolver = OpenBabelResolver::new(config.obabel.clone());
        Self::with_resolver(config, Box::new(resolver))
    }

    pub fn with_resolver(config: Config, molecules: Box<dyn MoleculeResolver>) -> Self {
        let templates = orca::TemplateStore::new(&config.orca_templates_dir);
        Self {
            config,
            molecules,
            templates,
            events: Vec::new(),
            span: tracing::info_span!("engine"),
        }
    }

    /// One pass over every task directory under the calculation directory.
    /// Directory-level failures are logged and do not stop the pass.
    pub fn run_pass(&mut self) -> Result<Vec<PassResult>, EngineError> {
        let dirs = discovery::find_task_dirs(&self.config.calc_dir)?;
        if dirs.is_empty() {
            info!(
                "no task directories under {}",
                self.config.calc_dir.display()
            );
        }

        let mut results = Vec::with_capacity(dirs.len());
        for td in &dirs {
            match self.process_task_dir(td) {
                Ok(r) => results.push(r),
                Err(EngineError::Locked { path }) => {
                    warn!("skipping {}: locked by another pass", path.display());
                }
                Err(e) => error!("{}: {}", td.task_file.display(), e),
            }
        }
        Ok(results)
    }

    /// One pass over a single task directory (or task file).
    pub fn run_pass_in(&mut self, path: &Path) -> Result<PassResult, EngineError> {
        let td = TaskDir::for_path(path)?;
        self.process_task_dir(&td)
    }

    /// Process every block of one task file.
    pub fn process_task_dir(&mut self, td: &TaskDir) -> Result<PassResult, EngineError> {
        let span = tracing::info_span!(parent: &self.span, "task", base = %td.base_name);
        let _enter = span.enter();
        let start = Instant::now();

        let dir = absolute_dir(&td.dir)?;
        let task_file = dir.join(
            td.task_file
                .file_name()
                .ok_or_else(|| EngineError::Config(format!("bad task file {}", td.task_file.display())))?,
        );

        let _lock = PassLock::acquire(&dir)?;
        template::expand_task_file(&task_file, &self.config.templates_dir)?;
        let task = parser::parse_task_file(&task_file)?;
        let mut state = state::load_state(&dir, &task.base_name)?
            .unwrap_or_else(|| state::new_state(&task.base_name));

        self.events.clear();
        info!("Starting task: {}", task_file.display());

        let mut result = PassResult {
            task_file: task_file.clone(),
            generated: 0,
            skipped: 0,
            failed: 0,
            commands_emitted: 0,
            total_duration: Default::default(),
        };

        for block in &task.blocks {
            match self.process_block(&dir, &task, block, &mut state, &mut result) {
                BlockOutcome::Generated => result.generated += 1,
                BlockOutcome::Skipped => result.skipped += 1,
                BlockOutcome::Failed => result.failed += 1,
            }
        }

        info!("Leaving task: {}", task_file.display());
        result.total_duration = start.elapsed();

        // A pass that changed nothing leaves the event log untouched
        let events = std::mem::take(&mut self.events);
        if events.is_empty() {
            debug!("no changes in {}", task_file.display());
            return Ok(result);
        }
        let run_id = eventlog::generate_run_id();
        record_event(
            &dir,
            TaskEvent::PassStarted {
                task: task.base_name.clone(),
                run_id: run_id.clone(),
                tasker_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        );
        for event in events {
            record_event(&dir, event);
        }
        record_event(
            &dir,
            TaskEvent::PassCompleted {
                task: task.base_name.clone(),
                run_id,
                generated: result.generated,
                skipped: result.skipped,
                failed: result.failed,
                total_seconds: result.total_duration.as_secs_f64(),
            },
        );
        Ok(result)
    }

    /// Errors never leave the block: they are recorded on its sidecar
    /// entry and the pass moves on to the next block.
    fn process_block(
        &mut self,
        dir: &Path,
        task: &TaskFile,
        block: &TaskBlock,
        state: &mut StateFile,
        result: &mut PassResult,
    ) -> BlockOutcome {
        let readiness = planner::assess(
            block,
            &PlanContext {
                task_dir: dir,
                task,
                state: Some(&*state),
                termination_marker: &self.config.termination_marker,
            },
        );

        match readiness {
            Readiness::SkipDone { commands_pending } => {
                debug!("skip {}: done", block.title);
                if !block.completed {
                    match state::mark_title_quoted(&task.path, &block.title, block.title_line) {
                        Ok(true) => info!("Restored completion marker of {}", block.title),
                        Ok(false) => {}
                        Err(e) => error!("{}: {}", block.title, quote_error(&task.path, e)),
                    }
                }
                if commands_pending && self.emit_commands(dir, task, block, state, true) {
                    result.commands_emitted += 1;
                }
                BlockOutcome::Skipped
            }
            Readiness::SkipUnready { reason } => {
                debug!("skip {}: {}", block.title, reason);
                BlockOutcome::Skipped
            }
            readiness => {
                let committed = self
                    .generate_block(dir, &task.base_name, block, &readiness)
                    .and_then(|artifacts| self.commit_success(dir, task, block, state, &artifacts));
                if let Err(e) = committed {
                    return self.fail_block(dir, task, block, state, &e);
                }
                if !block.post_commands.is_empty()
                    && self.emit_commands(dir, task, block, state, true)
                {
                    result.commands_emitted += 1;
                }
                BlockOutcome::Generated
            }
        }
    }

    fn fail_block(
        &mut self,
        dir: &Path,
        task: &TaskFile,
        block: &TaskBlock,
        state: &mut StateFile,
        e: &EngineError,
    ) -> BlockOutcome {
        error!("Error processing {}: {}", block.title, e);
        let entry = state::block_entry(state, &block.title, &block.definition_hash);
        entry.status = BlockStatus::Failed;
        entry.definition_hash = block.definition_hash.clone();
        entry.error = Some(e.to_string());
        if let Err(save) = state::save_state(dir, state) {
            error!("{}: {}", block.title, save);
        }
        self.events.push(TaskEvent::BlockFailed {
            task: task.base_name.clone(),
            block: block.title.clone(),
            error: e.to_string(),
        });
        BlockOutcome::Failed
    }

    /// Resolve geometry for a runnable block and write its inputs.
    fn generate_block(
        &mut self,
        dir: &Path,
        base_name: &str,
        block: &TaskBlock,
        readiness: &Readiness,
    ) -> Result<Vec<Artifact>, EngineError> {
        let out = artifacts::output_dir(dir, &block.title);
        let (record, quarantined) = match readiness {
            Readiness::RunOrigin => (self.origin_geometry(dir, base_name, block)?, None),
            Readiness::RunChained { source } => {
                let log = planner::log_path(dir, source, base_name);
                info!("{}: geometry from {}", block.title, log.display());
                (geometry::read_geometry(&log)?, None)
            }
            Readiness::RunRestart => {
                let log = planner::log_path(dir, &block.title, base_name);
                let record = geometry::read_geometry(&log)?;
                // Reject the block before its previous run is moved aside
                self.check_inputs(block, &record)?;
                let prior = match &block.variant {
                    Variant::Primary => gaussian::prior_outputs(&out, block, base_name),
                    Variant::Secondary(_) => orca::prior_outputs(&out, &block.title, base_name),
                };
                let quarantine = artifacts::quarantine(&out, &prior)?;
                info!(
                    "Restart {}: previous run moved to {}",
                    block.title,
                    quarantine.display()
                );
                (record, Some(quarantine))
            }
            Readiness::SkipDone { .. } | Readiness::SkipUnready { .. } => {
                return Err(EngineError::Readiness {
                    block: block.title.clone(),
                    reason: readiness.to_string(),
                })
            }
        };

        let written = self.write_inputs(base_name, block, &out, &record);
        if let (Err(e), Some(quarantine)) = (&written, &quarantined) {
            warn!(
                "{}: {}; restoring previous run from {}",
                block.title,
                e,
                quarantine.display()
            );
            if let Err(restore) = artifacts::restore(quarantine, &out) {
                error!("{}: {}", block.title, restore);
            }
        }
        written
    }

    /// Keyword or template resolution that generation would fail on.
    fn check_inputs(&mut self, block: &TaskBlock, record: &GeometryRecord) -> Result<(), EngineError> {
        match &block.variant {
            Variant::Primary => gaussian::resolve_keywords(block, record).map(drop),
            Variant::Secondary(sec) => {
                orca::resolve_template(&block.title, sec, &mut self.templates)?;
                Ok(())
            }
        }
    }

    fn write_inputs(
        &mut self,
        base_name: &str,
        block: &TaskBlock,
        out: &Path,
        record: &GeometryRecord,
    ) -> Result<Vec<Artifact>, EngineError> {
        std::fs::create_dir_all(out).map_err(|e| EngineError::generation(out, e))?;
        match &block.variant {
            Variant::Primary => gaussian::generate(block, base_name, out, record),
            Variant::Secondary(sec) => orca::generate(
                &block.title,
                sec,
                base_name,
                out,
                record,
                &mut self.templates,
            ),
        }
    }

    /// Molecule override → file override → base structure.
    fn origin_geometry(
        &self,
        dir: &Path,
        base_name: &str,
        block: &TaskBlock,
    ) -> Result<GeometryRecord, EngineError> {
        if let Some(id) = &block.molecule_override {
            info!("{}: geometry from identifier {}", block.title, id);
            return Ok(self.molecules.resolve(id)?);
        }
        if let Some(file) = &block.file_override {
            let path = dir.join(file);
            info!("{}: geometry from {}", block.title, path.display());
            return Ok(geometry::read_geometry(&path)?);
        }
        let path = discovery::find_structure_file(dir, base_name).ok_or_else(|| {
            GeometryError::NotFound {
                path: dir.join(format!("{}.com", base_name)),
            }
        })?;
        Ok(geometry::read_geometry(&path)?)
    }

    /// Sidecar first, then the visible title marker.
    fn commit_success(
        &mut self,
        dir: &Path,
        task: &TaskFile,
        block: &TaskBlock,
        state: &mut StateFile,
        artifacts: &[Artifact],
    ) -> Result<(), EngineError> {
        let relative: Vec<(String, String)> = artifacts
            .iter()
            .map(|a| {
                let rel = a.path.strip_prefix(dir).unwrap_or(&a.path);
                (rel.to_string_lossy().to_string(), a.hash.clone())
            })
            .collect();

        let entry = state::block_entry(state, &block.title, &block.definition_hash);
        entry.status = BlockStatus::Done;
        entry.definition_hash = block.definition_hash.clone();
        entry.generated_at = Some(eventlog::now_iso8601());
        entry.commands_emitted = false;
        entry.error = None;
        entry.artifacts = relative.iter().cloned().collect();
        state::save_state(dir, state)?;

        state::mark_title_quoted(&task.path, &block.title, block.title_line)
            .map_err(|e| quote_error(&task.path, e))?;

        self.events.push(TaskEvent::BlockGenerated {
            task: task.base_name.clone(),
            block: block.title.clone(),
            route: route_summary(block),
            artifacts: relative.into_iter().map(|(p, _)| p).collect(),
        });
        Ok(())
    }

    /// Write `comd` and record the emission. Failures are logged and leave
    /// the commands pending for the next pass.
    fn emit_commands(
        &mut self,
        dir: &Path,
        task: &TaskFile,
        block: &TaskBlock,
        state: &mut StateFile,
        record_ledger: bool,
    ) -> bool {
        let out = artifacts::output_dir(dir, &block.title);
        let emitted =
            match codegen::emit_script(&block.post_commands, &out, &self.config, record_ledger) {
                Ok(e) => e,
                Err(e) => {
                    error!("{}: cannot emit commands: {}", block.title, e);
                    return false;
                }
            };

        state::block_entry(state, &block.title, &block.definition_hash).commands_emitted = true;
        if let Err(e) = state::save_state(dir, state) {
            error!("{}: {}", block.title, e);
            return false;
        }
        info!("Generated {}", emitted.path.display());
        self.events.push(TaskEvent::CommandsEmitted {
            task: task.base_name.clone(),
            block: block.title.clone(),
            lines: emitted.lines,
        });
        true
    }

    /// Rewrite `comd` for every block with post commands. The ledger is
    /// touched only for blocks whose commands were never emitted.
    pub fn regenerate_commands(&mut self, path: &Path) -> Result<u32, EngineError> {
        let td = TaskDir::for_path(path)?;
        let dir = absolute_dir(&td.dir)?;
        let _lock = PassLock::acquire(&dir)?;
        let task = parser::parse_task_file(&td.task_file)?;
        let mut state = state::load_state(&dir, &task.base_name)?
            .unwrap_or_else(|| state::new_state(&task.base_name));

        let mut written = 0u32;
        for block in task.blocks.iter().filter(|b| !b.post_commands.is_empty()) {
            let entry = state.blocks.get(&block.title);
            let already = entry.is_some_and(|e| e.commands_emitted);
            let done = entry.is_some_and(|e| e.status == BlockStatus::Done);

            if done {
                if self.emit_commands(&dir, &task, block, &mut state, !already) {
                    written += 1;
                }
                continue;
            }
            let out = artifacts::output_dir(&dir, &block.title);
            let emitted = codegen::emit_script(&block.post_commands, &out, &self.config, false)?;
            info!("Generated {}", emitted.path.display());
            written += 1;
        }
        for event in std::mem::take(&mut self.events) {
            record_event(&dir, event);
        }
        Ok(written)
    }
}

/// Unquote a block and drop its sidecar entry. Returns whether anything
/// changed.
pub fn reset_block(path: &Path, title: &str) -> Result<bool, EngineError> {
    let td = TaskDir::for_path(path)?;
    let _lock = PassLock::acquire(&td.dir)?;
    let unquoted =
        state::unquote_title(&td.task_file, title).map_err(|e| quote_error(&td.task_file, e))?;

    let mut removed = false;
    if let Some(mut st) = state::load_state(&td.dir, &td.base_name)? {
        removed = st.blocks.shift_remove(title).is_some();
        if removed {
            state::save_state(&td.dir, &mut st)?;
        }
    }
    if unquoted || removed {
        info!("Reset {} in {}", title, td.task_file.display());
    }
    Ok(unquoted || removed)
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, EngineError> {
    std::path::absolute(dir)
        .map_err(|e| EngineError::Config(format!("cannot resolve {}: {}", dir.display(), e)))
}

fn quote_error(task_file: &Path, e: std::io::Error) -> EngineError {
    EngineError::State(format!("cannot update {}: {}", task_file.display(), e))
}

fn route_summary(block: &TaskBlock) -> String {
    match &block.variant {
        Variant::Primary => block
            .keyword_template
            .clone()
            .unwrap_or_else(|| "(carried over)".to_string()),
        Variant::Secondary(sec) => format!("secondary job={}", sec.job().unwrap_or("?")),
    }
}

fn record_event(dir: &Path, event: TaskEvent) {
    if let Err(e) = eventlog::append_event(dir, event) {
        warn!("cannot append event in {}: {}", dir.display(), e);
    }
}
