//! `copy=(src>dst|...)` and `move=(src>dst|...)`.

use super::{items, shell_quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Move,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: String,
    /// Target directory, without trailing slash
    pub target: String,
}

/// Items without `>` or with an empty side are dropped.
pub fn parse(content: &str) -> Vec<Transfer> {
    items(content)
        .into_iter()
        .filter_map(|item| {
            let (source, target) = item.split_once('>')?;
            let source = source.trim();
            let trimmed = target.trim().trim_end_matches('/');
            // A bare "/" target stays "/"
            let target = if trimmed.is_empty() && target.trim().starts_with('/') {
                "/"
            } else {
                trimmed
            };
            if source.is_empty() || target.is_empty() {
                return None;
            }
            Some(Transfer {
                source: source.to_string(),
                target: target.to_string(),
            })
        })
        .collect()
}

pub fn lines(kind: TransferKind, transfers: &[Transfer]) -> Vec<String> {
    let verb = match kind {
        TransferKind::Copy => "cp -r",
        TransferKind::Move => "mv",
    };
    let mut out = Vec::with_capacity(transfers.len() * 2);
    for t in transfers {
        out.push(format!("mkdir -p {}", shell_quote(&t.target)));
        let dest = if t.target.ends_with('/') {
            t.target.clone()
        } else {
            format!("{}/", t.target)
        };
        // Sources stay unquoted so globs expand
        out.push(format!("{} {} {}", verb, t.source, shell_quote(&dest)));
    }
    out
}
