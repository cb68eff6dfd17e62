//! Primary-solver (Gaussian) input files.

use super::{write_artifact, Artifact};
use crate::core::error::EngineError;
use crate::core::keywords::{self, ExpandedKeyword};
use crate::core::types::{GeometryRecord, TaskBlock};
use std::path::{Path, PathBuf};

/// `<tag_><title>_<base>`: shared stem of the input, checkpoint and log.
pub fn output_stem(expanded: &ExpandedKeyword, title: &str, base_name: &str) -> String {
    format!("{}{}_{}", expanded.file_prefix(), title, base_name)
}

/// Render one input file.
pub fn render_input(
    title: &str,
    keywords: &str,
    chk_path: &Path,
    record: &GeometryRecord,
    extra_keywords: Option<&str>,
) -> String {
    let mut out = format!("%chk={}\n#{}\n\n{}\n\n", chk_path.display(), keywords, title);
    out.push_str(&format!(
        "{} {}\n",
        record.charge, record.spin_multiplicity
    ));
    for line in &record.coordinates {
        out.push_str(line);
        out.push('\n');
    }
    if let Some(extra) = extra_keywords.filter(|e| !e.is_empty()) {
        out.push('\n');
        out.push_str(extra);
    }
    out.push_str("\n\n");
    out
}

/// Route used when a seed structure carries none.
pub const DEFAULT_SEED_ROUTE: &str = "# opt b3lyp/6-31g(d)";

/// Base structure input (`<base>.com`) seeded from an existing geometry.
pub fn render_seed_input(base_name: &str, record: &GeometryRecord) -> String {
    let route = record
        .solver_keywords
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or(DEFAULT_SEED_ROUTE);
    let mut out = format!(
        "%chk={}.chk\n{}\n\nTitle Card Required\n\n{} {}\n",
        base_name, route, record.charge, record.spin_multiplicity
    );
    for line in &record.coordinates {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// The block's keyword template, or the route carried over from the
/// geometry source with its leading `#` removed.
pub fn resolve_keywords(block: &TaskBlock, record: &GeometryRecord) -> Result<String, EngineError> {
    if let Some(kw) = &block.keyword_template {
        return Ok(kw.clone());
    }
    record
        .solver_keywords
        .as_deref()
        .map(|k| k.strip_prefix('#').unwrap_or(k).to_string())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| EngineError::MissingKeywords {
            block: block.title.clone(),
        })
}

/// Files a previous run of this block may have left: input, checkpoint and
/// log for every expanded keyword set.
pub fn prior_outputs(output_dir: &Path, block: &TaskBlock, base_name: &str) -> Vec<PathBuf> {
    let template = block.keyword_template.as_deref().unwrap_or("");
    keywords::expand(template)
        .iter()
        .flat_map(|e| {
            let stem = output_stem(e, &block.title, base_name);
            ["gjf", "chk", "log"].map(|ext| output_dir.join(format!("{}.{}", stem, ext)))
        })
        .collect()
}

/// Write one input per expanded keyword set into `output_dir`.
pub fn generate(
    block: &TaskBlock,
    base_name: &str,
    output_dir: &Path,
    record: &GeometryRecord,
) -> Result<Vec<Artifact>, EngineError> {
    let template = resolve_keywords(block, record)?;
    let expanded = keywords::expand(&template);
    if expanded.len() > 1 {
        tracing::info!("{}: {} keyword sets", block.title, expanded.len());
    }

    let mut artifacts = Vec::with_capacity(expanded.len());
    for e in &expanded {
        let stem = output_stem(e, &block.title, base_name);
        let chk = output_dir.join(format!("{}.chk", stem));
        let path = output_dir.join(format!("{}.gjf", stem));
        let body = render_input(
            &block.title,
            &e.keywords,
            &chk,
            record,
            block.extra_keywords.as_deref(),
        );
        artifacts.push(write_artifact(&path, &body)?);
        tracing::info!("Generated {}", path.display());
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_blocks;

    fn helium() -> GeometryRecord {
        GeometryRecord {
            charge: 0,
            spin_multiplicity: 1,
            coordinates: vec!["He 0.0 0.0 0.0".to_string()],
            solver_keywords: Some("# opt b3lyp/6-31g(d)".to_string()),
        }
    }

    #[test]
    fn test_render_input_layout() {
        let text = render_input(
            "opt",
            " opt b3lyp/6-31g(d)",
            Path::new("/calc/he/opt/opt_he.chk"),
            &helium(),
            None,
        );
        assert_eq!(
            text,
            "%chk=/calc/he/opt/opt_he.chk\n# opt b3lyp/6-31g(d)\n\nopt\n\n0 1\nHe 0.0 0.0 0.0\n\n\n"
        );
    }

    #[test]
    fn test_render_input_extra_keywords() {
        let text = render_input("td", "td", Path::new("x.chk"), &helium(), Some("C 0\nH 0"));
        assert!(text.ends_with("He 0.0 0.0 0.0\n\nC 0\nH 0\n\n"));
    }

    #[test]
    fn test_render_seed_input() {
        let mut he = helium();
        assert_eq!(
            render_seed_input("he", &he),
            "%chk=he.chk\n# opt b3lyp/6-31g(d)\n\nTitle Card Required\n\n0 1\nHe 0.0 0.0 0.0\n\n"
        );
        he.solver_keywords = Some("# freq".to_string());
        assert!(render_seed_input("he", &he).contains("\n# freq\n"));
    }

    #[test]
    fn test_resolve_keywords_carried_over() {
        let blocks = parse_blocks("$freq\n%opt\n\n$sp\n# sp\n");
        assert_eq!(
            resolve_keywords(&blocks[0], &helium()).unwrap(),
            " opt b3lyp/6-31g(d)"
        );
        assert_eq!(resolve_keywords(&blocks[1], &helium()).unwrap(), " sp");

        let mut bare = helium();
        bare.solver_keywords = None;
        assert!(matches!(
            resolve_keywords(&blocks[0], &bare),
            Err(EngineError::MissingKeywords { .. })
        ));
    }

    #[test]
    fn test_generate_expanded_files() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = parse_blocks("$opt\n# opt {A,B}/6-31G(d)\n");
        let artifacts = generate(&blocks[0], "he", dir.path(), &helium()).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].path, dir.path().join("A_opt_he.gjf"));
        assert_eq!(artifacts[1].path, dir.path().join("B_opt_he.gjf"));

        let a = std::fs::read_to_string(&artifacts[0].path).unwrap();
        assert!(a.contains("# opt A/6-31G(d)\n"));
        assert!(a.contains(&format!("%chk={}", dir.path().join("A_opt_he.chk").display())));
        let b = std::fs::read_to_string(&artifacts[1].path).unwrap();
        assert!(b.contains("# opt B/6-31G(d)\n"));
    }

    #[test]
    fn test_prior_outputs() {
        let blocks = parse_blocks("$opt\n%restart\n# opt {A,B}\n");
        let files = prior_outputs(Path::new("/o"), &blocks[0], "m");
        assert_eq!(files.len(), 6);
        assert_eq!(files[0], PathBuf::from("/o/A_opt_m.gjf"));
        assert_eq!(files[5], PathBuf::from("/o/B_opt_m.log"));
    }
}
