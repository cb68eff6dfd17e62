//! Post-processing command handlers: one module per command kind.
//!
//! Each handler turns the parenthesised item list of a `key=(...)` token
//! into shell lines for the block's `comd` script.

pub mod convtest;
pub mod multiwfn;
pub mod scripts;
pub mod transfer;

/// Split `(a|b,c|d)` into trimmed, non-empty items.
pub fn items(content: &str) -> Vec<&str> {
    let content = content.trim();
    let content = content.strip_prefix('(').unwrap_or(content);
    let content = content.strip_suffix(')').unwrap_or(content);
    content
        .split('|')
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .collect()
}

/// Split an item into its head and comma-separated trailing arguments.
pub fn head_and_args(item: &str) -> (&str, Vec<&str>) {
    let mut parts = item.split(',').map(str::trim);
    let head = parts.next().unwrap_or("");
    (head, parts.filter(|a| !a.is_empty()).collect())
}

/// Quote `word` for a POSIX shell unless it consists only of characters
/// the shell passes through unchanged.
pub fn shell_quote(word: &str) -> String {
    let plain = |c: char| c.is_ascii_alphanumeric() || "_-./~+:,=@%".contains(c);
    if !word.is_empty() && word.chars().all(plain) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}
