//! `multiwfn=(template>input[,arg]*|...)`: Multiwfn runs driven by stored
//! answer files in `$wfn_examples`.

use super::{head_and_args, items};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiwfnCall {
    /// Answer file stem under `$wfn_examples`
    pub template: String,
    /// Wavefunction file, may be a glob
    pub input: String,
    pub args: Vec<String>,
}

/// Items without `>` or with an empty side are dropped.
pub fn parse(content: &str) -> Vec<MultiwfnCall> {
    items(content)
        .into_iter()
        .filter_map(|item| {
            let (head, args) = head_and_args(item);
            let (template, input) = head.split_once('>')?;
            let (template, input) = (template.trim(), input.trim());
            if template.is_empty() || input.is_empty() {
                return None;
            }
            Some(MultiwfnCall {
                template: template.to_string(),
                input: input.to_string(),
                args: args.into_iter().map(str::to_string).collect(),
            })
        })
        .collect()
}

pub fn lines(calls: &[MultiwfnCall]) -> Vec<String> {
    calls
        .iter()
        .map(|c| {
            let mut line = format!("Multiwfn ./{} < $wfn_examples/{}.txt", c.input, c.template);
            for arg in &c.args {
                line.push(' ');
                line.push_str(arg);
            }
            line.push_str(&format!(" > mw_{}_out.txt", c.template));
            line
        })
        .collect()
}
