//! CLI subcommands: run, plan, status, reset, comd, init, build, verify, completions.

pub mod logging;

use crate::artifacts::gaussian;
use crate::core::config::Config;
use crate::core::discovery::{self, TaskDir};
use crate::core::batch::{self, BatchMethod};
use crate::core::executor::{self, Engine};
use crate::core::planner::{self, PlanContext};
use crate::core::types::{PassResult, Readiness, TaskEvent, TaskFile, TaskPlan};
use crate::core::{codegen, parser, state, template};
use crate::directives::convtest;
use crate::geometry::{self, OpenBabelResolver, StructureFormat};
use crate::tripwire::{drift, eventlog};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate inputs for every ready block
    Run {
        /// Task directory or task file (default: every directory under the calc dir)
        path: Option<PathBuf>,
    },

    /// Show per-block readiness without writing anything
    Plan {
        /// Task directory or task file
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show recorded block state
    Status {
        /// Task directory or task file
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Mark a block pending again
    Reset {
        /// Task directory or task file
        path: PathBuf,

        /// Block title
        title: String,
    },

    /// Rewrite command scripts for blocks with post commands
    Comd {
        /// Task directory or task file
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Prepare a task directory from a structure file
    Init {
        /// Structure file (.com, .gjf, .xyz, .log)
        structure: PathBuf,

        /// Task-file template name or path
        #[arg(default_value = "sp")]
        template: String,

        /// Directory to initialize (default: current)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Create task directories from `smiles.txt` (`<SMILES> <name>` per line)
    Build {
        /// Directory holding smiles.txt (default: the calc dir)
        path: Option<PathBuf>,

        /// Functional of the default task chain
        #[arg(short, long, default_value = "wB97XD")]
        functional: String,

        /// Basis set of the default task chain
        #[arg(short, long, default_value = "TZVP")]
        basis: String,

        /// SCRF solvent of the default task chain
        #[arg(short, long, default_value = "water")]
        solvent: String,

        /// Task-file template used instead of the default chain
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Compare recorded artifact hashes with files on disk
    Verify {
        /// Task directory or task file
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Exit non-zero on any drift
        #[arg(long)]
        tripwire: bool,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command. `Completions` is handled by the binary, which
/// owns the top-level parser.
pub fn dispatch(cmd: Commands, config: Config) -> Result<(), String> {
    match cmd {
        Commands::Run { path } => cmd_run(config, path.as_deref()),
        Commands::Plan { path } => cmd_plan(&config, &path),
        Commands::Status { path } => cmd_status(&path),
        Commands::Reset { path, title } => cmd_reset(&path, &title),
        Commands::Comd { path } => cmd_comd(config, &path),
        Commands::Init {
            structure,
            template,
            dir,
        } => cmd_init(&config, &structure, &template, &dir),
        Commands::Build {
            path,
            functional,
            basis,
            solvent,
            template,
        } => {
            let method = BatchMethod {
                functional,
                basis,
                solvent,
            };
            cmd_build(&config, path.as_deref(), &method, template.as_deref())
        }
        Commands::Verify { path, tripwire } => cmd_verify(&path, tripwire),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Write completions for `shell` to stdout.
pub fn print_completions(shell: clap_complete::Shell, cmd: &mut clap::Command) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, cmd, name, &mut std::io::stdout());
}

fn cmd_run(config: Config, path: Option<&Path>) -> Result<(), String> {
    let mut engine = Engine::new(config);
    let results = match path {
        Some(p) => vec![engine.run_pass_in(p).map_err(|e| e.to_string())?],
        None => engine.run_pass().map_err(|e| e.to_string())?,
    };

    for r in &results {
        print_pass(r);
    }
    let failed: u32 = results.iter().map(|r| r.failed).sum();
    let generated: u32 = results.iter().map(|r| r.generated).sum();
    println!();
    println!(
        "Pass complete: {} task file(s), {} block(s) generated, {} failed.",
        results.len(),
        generated,
        failed
    );
    if failed > 0 {
        return Err(format!("{} block(s) failed", failed));
    }
    Ok(())
}

fn print_pass(r: &PassResult) {
    println!(
        "{}: {} generated, {} skipped, {} failed, {} comd ({:.2}s)",
        r.task_file.display(),
        r.generated,
        r.skipped,
        r.failed,
        r.commands_emitted,
        r.total_duration.as_secs_f64()
    );
}

fn cmd_plan(config: &Config, path: &Path) -> Result<(), String> {
    let td = TaskDir::for_path(path).map_err(|e| e.to_string())?;
    let content = std::fs::read_to_string(&td.task_file)
        .map_err(|e| format!("cannot read {}: {}", td.task_file.display(), e))?;
    if let Some(name) = template::parse_directive(&content) {
        println!(
            "{} imports template '{}'; it is expanded on the next run.",
            td.task_file.display(),
            name
        );
        return Ok(());
    }
    let task = parser::parse_task_file(&td.task_file).map_err(|e| e.to_string())?;
    let st = state::load_state(&td.dir, &td.base_name).map_err(|e| e.to_string())?;

    let plan = planner::plan(&PlanContext {
        task_dir: &td.dir,
        task: &task,
        state: st.as_ref(),
        termination_marker: &config.termination_marker,
    });
    print_plan(&plan, &task);
    Ok(())
}

fn print_plan(plan: &TaskPlan, task: &TaskFile) {
    println!("Planning: {} ({} blocks)", plan.task_file.display(), plan.blocks.len());
    println!();
    for (planned, block) in plan.blocks.iter().zip(&task.blocks) {
        let symbol = match &planned.readiness {
            Readiness::SkipDone { .. } => " ",
            Readiness::SkipUnready { .. } => "?",
            _ => "+",
        };
        let detail = match &planned.readiness {
            Readiness::SkipDone {
                commands_pending: true,
            } => " (comd pending)".to_string(),
            Readiness::SkipUnready { reason } => format!(" ({})", reason),
            Readiness::RunChained { source } => format!(" (from {})", source),
            _ => String::new(),
        };
        println!(
            "  {} {} [{}] {}{}",
            symbol, planned.title, block.variant, planned.readiness, detail
        );
        for token in &block.post_commands {
            println!("      ! {}", codegen::describe(token));
        }
    }
    println!();
    println!(
        "Plan: {} to generate, {} waiting, {} done.",
        plan.to_run, plan.unready, plan.done
    );
}

fn cmd_status(path: &Path) -> Result<(), String> {
    let td = TaskDir::for_path(path).map_err(|e| e.to_string())?;
    let Some(st) = state::load_state(&td.dir, &td.base_name).map_err(|e| e.to_string())? else {
        println!("No state found. Run `tasker run` first.");
        return Ok(());
    };

    println!("Task: {}", st.task);
    println!("  Generated: {}", st.generated_at);
    println!("  Generator: {}", st.generator);
    if let Some(last) = last_completed_pass(&td.dir) {
        println!("  Last pass: {}", last);
    }
    println!("  Blocks: {}", st.blocks.len());
    for (title, bs) in &st.blocks {
        let comd = if bs.commands_emitted { " +comd" } else { "" };
        let when = bs.generated_at.as_deref().unwrap_or("-");
        println!("    {}: {} ({}){}", title, bs.status, when, comd);
        if let Some(err) = &bs.error {
            println!("      error: {}", err);
        }
    }
    Ok(())
}

fn last_completed_pass(dir: &Path) -> Option<String> {
    eventlog::read_events(dir)
        .ok()?
        .into_iter()
        .rev()
        .find(|e| matches!(e.event, TaskEvent::PassCompleted { .. }))
        .map(|e| e.ts)
}

fn cmd_reset(path: &Path, title: &str) -> Result<(), String> {
    if executor::reset_block(path, title).map_err(|e| e.to_string())? {
        println!("Reset {}.", title);
    } else {
        println!("Nothing to reset for {}.", title);
    }
    Ok(())
}

fn cmd_comd(config: Config, path: &Path) -> Result<(), String> {
    let mut engine = Engine::new(config);
    let n = engine.regenerate_commands(path).map_err(|e| e.to_string())?;
    println!("Wrote {} command script(s).", n);
    Ok(())
}

fn cmd_init(config: &Config, structure: &Path, template_name: &str, dir: &Path) -> Result<(), String> {
    let base_name = structure
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| format!("bad structure path {}", structure.display()))?;
    let format = StructureFormat::from_path(structure).map_err(|e| e.to_string())?;
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;

    let task_path = dir.join(format!("{}.task", base_name));
    if task_path.exists() {
        return Err(format!("{} already exists", task_path.display()));
    }

    let seeded = if format == StructureFormat::GaussianLog {
        let record = geometry::read_geometry(structure).map_err(|e| e.to_string())?;
        let com = dir.join(format!("{}.com", base_name));
        std::fs::write(&com, gaussian::render_seed_input(&base_name, &record))
            .map_err(|e| format!("cannot write {}: {}", com.display(), e))?;
        com
    } else {
        let name = structure
            .file_name()
            .ok_or_else(|| format!("bad structure path {}", structure.display()))?;
        let dest = dir.join(name);
        if !same_file(structure, &dest) {
            std::fs::copy(structure, &dest)
                .map_err(|e| format!("cannot copy to {}: {}", dest.display(), e))?;
        }
        dest
    };

    let tpl = template::find_template(template_name, &config.templates_dir).map_err(|e| e.to_string())?;
    let body = template::read_template(&tpl).map_err(|e| e.to_string())?;
    std::fs::write(&task_path, body)
        .map_err(|e| format!("cannot write {}: {}", task_path.display(), e))?;

    println!("Initialized task directory {}", dir.display());
    println!("  Structure: {}", seeded.display());
    println!("  Task:      {} (from {})", task_path.display(), tpl.display());
    if discovery::find_structure_file(dir, &base_name).is_none() {
        println!("  warning: no base structure found for {}", base_name);
    }

    let abs = std::path::absolute(dir).map_err(|e| format!("cannot resolve {}: {}", dir.display(), e))?;
    convtest::append_to_ledger(&config.registry_path, &abs)
        .map_err(|e| format!("cannot register in {}: {}", config.registry_path.display(), e))?;
    println!("  Registered in {}", config.registry_path.display());
    Ok(())
}

fn cmd_build(
    config: &Config,
    path: Option<&Path>,
    method: &BatchMethod,
    template_name: Option<&str>,
) -> Result<(), String> {
    let root = path.unwrap_or(config.calc_dir.as_path());
    let body = match template_name {
        Some(name) => {
            let tpl = template::find_template(name, &config.templates_dir).map_err(|e| e.to_string())?;
            Some(template::read_template(&tpl).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    let resolver = OpenBabelResolver::new(config.obabel.clone());
    let report =
        batch::build(root, method, body.as_deref(), &resolver).map_err(|e| e.to_string())?;

    for dir in &report.created {
        println!("  + {}", dir.display());
    }
    for (name, reason) in &report.failed {
        println!("  ! {}: {}", name, reason);
    }
    println!();
    println!(
        "Build complete: {} created, {} failed.",
        report.created.len(),
        report.failed.len()
    );
    if !report.failed.is_empty() {
        return Err(format!("{} molecule(s) failed", report.failed.len()));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn cmd_verify(path: &Path, tripwire_mode: bool) -> Result<(), String> {
    let td = TaskDir::for_path(path).map_err(|e| e.to_string())?;
    let Some(st) = state::load_state(&td.dir, &td.base_name).map_err(|e| e.to_string())? else {
        println!("No state found. Run `tasker run` first.");
        return Ok(());
    };

    println!("Checking {} ({} blocks)...", st.task, st.blocks.len());
    let findings = drift::detect_drift(&td.dir, &st);
    if findings.is_empty() {
        println!("No drift detected.");
        return Ok(());
    }
    for f in &findings {
        println!("  DRIFTED: {}/{} ({})", f.block, f.artifact, f.detail);
        println!("    Expected: {}", f.expected_hash);
        println!("    Actual:   {}", f.actual_hash);
    }
    println!();
    println!("Drift detected: {} artifact(s)", findings.len());
    if tripwire_mode {
        return Err(format!("{} drift finding(s)", findings.len()));
    }
    Ok(())
}
