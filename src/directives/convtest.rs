//! `convtest`: register the block's output directory in the convergence
//! ledger, and emit the shell fragment that removes it again.

use super::shell_quote;
use fs2::FileExt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Shell fragment removing the exact line `entry` from `ledger` if present.
pub fn guard_lines(entry: &Path, ledger: &Path) -> Vec<String> {
    let entry = shell_quote(&entry.display().to_string());
    let tmp = shell_quote(&format!("{}.tmp", ledger.display()));
    let ledger = shell_quote(&ledger.display().to_string());
    vec![
        format!("if grep -qxF {} {}; then", entry, ledger),
        format!("    grep -vxF {} {} > {}", entry, ledger, tmp),
        format!("    mv {} {}", tmp, ledger),
        "fi".to_string(),
    ]
}

/// Append `entry` to the ledger under an exclusive lock. Returns false when
/// the exact line is already present.
pub fn append_to_ledger(ledger: &Path, entry: &Path) -> io::Result<bool> {
    if let Some(parent) = ledger.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(ledger)?;
    file.lock_exclusive()?;

    let result = (|| {
        let line = entry.display().to_string();
        let mut content = String::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_string(&mut content)?;
        if content.lines().any(|l| l == line) {
            return Ok(false);
        }
        let sep = if content.is_empty() || content.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        writeln!(file, "{}{}", sep, line)?;
        Ok(true)
    })();

    FileExt::unlock(&file)?;
    result
}
