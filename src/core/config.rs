//! Engine configuration: defaults, optional YAML file, environment overrides.
//!
//! Resolved once by the binary and passed into [`crate::core::executor::Engine`].

use super::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Normal-termination marker of a Gaussian log's last line.
pub const DEFAULT_TERMINATION_MARKER: &str = "Normal termination";

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory whose subdirectories hold task files
    pub calc_dir: PathBuf,

    /// Task-file templates referenced by `@txt=`
    pub templates_dir: PathBuf,

    /// Secondary-solver (ORCA) input templates
    pub orca_templates_dir: PathBuf,

    /// Scripts exported as `$tasker_scripts` in `comd`
    pub scripts_dir: PathBuf,

    /// Multiwfn inputs exported as `$wfn_examples` in `comd`
    pub wfn_dir: PathBuf,

    /// Append-only ledger written by `convtest`
    pub ledger_path: PathBuf,

    /// Directories registered by `tasker init`
    pub registry_path: PathBuf,

    /// External 3D embedding toolkit executable
    pub obabel: String,

    /// Text expected in the last line of a finished solver log
    pub termination_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let tasker_home = dirs::config_dir()
            .map(|d| d.join("tasker"))
            .unwrap_or_else(|| home.join(".tasker"));
        Self::rooted(&home.join("AutoCalc").join("tasks"), &tasker_home, &home)
    }
}

impl Config {
    /// Configuration with every resource directory under `tasker_home`.
    pub fn rooted(calc_dir: &Path, tasker_home: &Path, home: &Path) -> Self {
        Self {
            calc_dir: calc_dir.to_path_buf(),
            templates_dir: tasker_home.join("templates"),
            orca_templates_dir: tasker_home.join("ORCA"),
            scripts_dir: tasker_home.join("scripts"),
            wfn_dir: tasker_home.join("wfntxts"),
            ledger_path: home.join(".sub").join("conv_test_list.txt"),
            registry_path: home.join(".sub").join("tasker_add"),
            obabel: "obabel".to_string(),
            termination_marker: DEFAULT_TERMINATION_MARKER.to_string(),
        }
    }

    /// Load with fallback chain: defaults → YAML file (if given) → environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .map_err(|e| EngineError::Config(format!("invalid {}: {}", path.display(), e)))?;
        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Override fields from environment variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(|v| expand_home(&v));

        if let Some(p) = path_var("TASKER_CALC_DIR") {
            self.calc_dir = p;
        }
        if let Some(p) = path_var("GAUSSIAN_TEMPLATE_DIR") {
            self.templates_dir = p;
        }
        if let Some(p) = path_var("TASKER_ORCA_TEMPLATES") {
            self.orca_templates_dir = p;
        }
        if let Some(p) = path_var("AUTOTASKER_SCRIPTS_PATH") {
            self.scripts_dir = p;
        }
        if let Some(p) = path_var("AUTOTASKER_WFN_PATH") {
            self.wfn_dir = p;
        }
        if let Some(p) = path_var("TASKER_LEDGER") {
            self.ledger_path = p;
        }
        if let Some(p) = path_var("TASKER_REGISTRY") {
            self.registry_path = p;
        }
        if let Some(prog) = lookup("TASKER_OBABEL").filter(|v| !v.is_empty()) {
            self.obabel = prog;
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_rooted_layout() {
        let c = Config::rooted(Path::new("/calc"), Path::new("/opt/tasker"), Path::new("/home/u"));
        assert_eq!(c.calc_dir, PathBuf::from("/calc"));
        assert_eq!(c.templates_dir, PathBuf::from("/opt/tasker/templates"));
        assert_eq!(c.orca_templates_dir, PathBuf::from("/opt/tasker/ORCA"));
        assert_eq!(c.wfn_dir, PathBuf::from("/opt/tasker/wfntxts"));
        assert_eq!(
            c.ledger_path,
            PathBuf::from("/home/u/.sub/conv_test_list.txt")
        );
        assert_eq!(c.registry_path, PathBuf::from("/home/u/.sub/tasker_add"));
        assert_eq!(c.termination_marker, "Normal termination");
    }

    #[test]
    fn test_env_overrides() {
        let mut c = Config::rooted(Path::new("/calc"), Path::new("/t"), Path::new("/h"));
        let env: HashMap<&str, &str> = HashMap::from([
            ("TASKER_CALC_DIR", "/elsewhere"),
            ("GAUSSIAN_TEMPLATE_DIR", "/tpl"),
            ("AUTOTASKER_WFN_PATH", ""),
            ("TASKER_OBABEL", "/usr/local/bin/obabel"),
            ("TASKER_REGISTRY", "/srv/registry"),
        ]);
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.calc_dir, PathBuf::from("/elsewhere"));
        assert_eq!(c.templates_dir, PathBuf::from("/tpl"));
        // Empty values are ignored
        assert_eq!(c.wfn_dir, PathBuf::from("/t/wfntxts"));
        assert_eq!(c.obabel, "/usr/local/bin/obabel");
        assert_eq!(c.registry_path, PathBuf::from("/srv/registry"));
    }

    #[test]
    fn test_load_from_yaml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasker.yaml");
        std::fs::write(&path, "calc_dir: /data/tasks\nobabel: obabel3\n").unwrap();
        let c = Config::load_from_file(&path).unwrap();
        assert_eq!(c.calc_dir, PathBuf::from("/data/tasks"));
        assert_eq!(c.obabel, "obabel3");
        assert_eq!(c.termination_marker, DEFAULT_TERMINATION_MARKER);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "calc_dir: [unclosed").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x"), home.join("x"));
        }
    }
}
