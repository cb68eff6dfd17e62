//! `scripts=(name[,arg]*|...)`: run helper scripts from `$tasker_scripts`.

use super::{head_and_args, items};

/// A helper-script call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCall {
    pub name: String,
    pub args: Vec<String>,
}

pub fn parse(content: &str) -> Vec<ScriptCall> {
    items(content)
        .into_iter()
        .filter_map(|item| {
            let (name, args) = head_and_args(item);
            (!name.is_empty()).then(|| ScriptCall {
                name: name.to_string(),
                args: args.into_iter().map(str::to_string).collect(),
            })
        })
        .collect()
}

pub fn lines(calls: &[ScriptCall]) -> Vec<String> {
    calls
        .iter()
        .map(|c| {
            let mut line = format!("bash $tasker_scripts/{}.sh", c.name);
            for arg in &c.args {
                line.push(' ');
                line.push_str(arg);
            }
            line
        })
        .collect()
}
