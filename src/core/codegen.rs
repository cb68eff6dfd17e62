//! Command-language dispatch and `comd` script rendering.
//!
//! Each `!` token maps to a [`Directive`]; each directive kind renders its
//! lines through its handler in [`crate::directives`]. Interpretation is
//! pure: the ledger side effect of `convtest` is returned as a request and
//! performed by [`emit_script`].

use super::config::Config;
use super::error::EngineError;
use super::state::write_atomic;
use crate::directives::{convtest, multiwfn, scripts, shell_quote, transfer};
use std::path::{Path, PathBuf};

/// One parsed command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Scripts(Vec<scripts::ScriptCall>),
    Multiwfn(Vec<multiwfn::MultiwfnCall>),
    Copy(Vec<transfer::Transfer>),
    Move(Vec<transfer::Transfer>),
    ConvTest,
    Literal(String),
}

/// Classify a command token. Unknown keys are literal shell.
pub fn parse_directive(token: &str) -> Directive {
    if token == "convtest" {
        return Directive::ConvTest;
    }
    let Some((key, content)) = token.split_once('=') else {
        return Directive::Literal(token.to_string());
    };
    match key.trim() {
        "scripts" => Directive::Scripts(scripts::parse(content)),
        "multiwfn" => Directive::Multiwfn(multiwfn::parse(content)),
        "copy" => Directive::Copy(transfer::parse(content)),
        "move" => Directive::Move(transfer::parse(content)),
        "convtest" => Directive::ConvTest,
        _ => Directive::Literal(token.to_string()),
    }
}

/// Shell lines for one directive.
pub fn directive_lines(directive: &Directive, output_dir: &Path, ledger: &Path) -> Vec<String> {
    match directive {
        Directive::Scripts(calls) => scripts::lines(calls),
        Directive::Multiwfn(calls) => multiwfn::lines(calls),
        Directive::Copy(t) => transfer::lines(transfer::TransferKind::Copy, t),
        Directive::Move(t) => transfer::lines(transfer::TransferKind::Move, t),
        Directive::ConvTest => convtest::guard_lines(output_dir, ledger),
        Directive::Literal(text) => vec![text.clone()],
    }
}

/// Result of interpreting a block's command tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    pub lines: Vec<String>,
    /// Ledger entries requested by `convtest`
    pub ledger_entries: Vec<PathBuf>,
}

/// Interpret tokens in order.
pub fn interpret(tokens: &[String], output_dir: &Path, ledger: &Path) -> Interpretation {
    let mut out = Interpretation::default();
    for token in tokens {
        let directive = parse_directive(token);
        if directive == Directive::ConvTest && !out.ledger_entries.iter().any(|p| p == output_dir)
        {
            out.ledger_entries.push(output_dir.to_path_buf());
        }
        out.lines
            .extend(directive_lines(&directive, output_dir, ledger));
    }
    out
}

/// Full `comd` text: fixed preamble, then the command lines.
pub fn render_script(lines: &[String], config: &Config) -> String {
    let mut out = String::from("# Command file generated by task processor\n");
    out.push_str(&format!(
        "export tasker_scripts={}\n",
        shell_quote(&config.scripts_dir.display().to_string())
    ));
    out.push_str(&format!(
        "export wfn_examples={}\n",
        shell_quote(&config.wfn_dir.display().to_string())
    ));
    out.push_str("# Multiwfn env\n");
    out.push_str("source $wfn_examples/env.sh\n\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Written `comd` script.
#[derive(Debug, Clone)]
pub struct EmittedScript {
    pub path: PathBuf,
    pub lines: u32,
}

/// Write `<output_dir>/comd` for `tokens`; append ledger entries when
/// `record_ledger` is set.
pub fn emit_script(
    tokens: &[String],
    output_dir: &Path,
    config: &Config,
    record_ledger: bool,
) -> Result<EmittedScript, EngineError> {
    let interp = interpret(tokens, output_dir, &config.ledger_path);
    let path = output_dir.join("comd");
    write_atomic(&path, render_script(&interp.lines, config).as_bytes())
        .map_err(|e| EngineError::generation(&path, e))?;

    if record_ledger {
        for entry in &interp.ledger_entries {
            let added = convtest::append_to_ledger(&config.ledger_path, entry)
                .map_err(|e| EngineError::generation(&config.ledger_path, e))?;
            if added {
                tracing::info!(
                    "Registered {} in {}",
                    entry.display(),
                    config.ledger_path.display()
                );
            }
        }
    }

    Ok(EmittedScript {
        path,
        lines: u32::try_from(interp.lines.len()).unwrap_or(u32::MAX),
    })
}

/// One-line summary of a token, for `plan` output.
pub fn describe(token: &str) -> String {
    match parse_directive(token) {
        Directive::Scripts(c) => format!("scripts ({} calls)", c.len()),
        Directive::Multiwfn(c) => format!("multiwfn ({} runs)", c.len()),
        Directive::Copy(t) => format!("copy ({} items)", t.len()),
        Directive::Move(t) => format!("move ({} items)", t.len()),
        Directive::ConvTest => "convtest".to_string(),
        Directive::Literal(text) => format!("shell '{}'", text),
    }
}
