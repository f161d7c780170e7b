//! Project settings stored in `.pipeline.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::branch_name::{
    BranchPolicy, DEFAULT_MAX_DESCRIPTION_LEN, DEFAULT_PROTECTED_BRANCHES, MAX_DESCRIPTION_LEN,
};

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = ".pipeline.toml";

/// Project-level settings (TOML).
///
/// Meant to be edited by humans and checked in. Missing fields default to
/// values that work with a stock agent install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Agent executable, looked up on `PATH` unless absolute.
    pub agent_binary: String,

    /// Branches that must not receive work directly.
    pub protected_branches: Vec<String>,

    /// Bound on the description part of generated branch names.
    pub max_description_len: usize,

    /// Timeout for each git subprocess call.
    pub git_timeout_secs: u64,

    /// Keep at most this many bytes of agent stderr.
    pub stderr_limit_bytes: usize,

    /// How long to wait for a killed agent to be reaped.
    pub kill_grace_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_binary: "claude".to_string(),
            protected_branches: DEFAULT_PROTECTED_BRANCHES
                .iter()
                .map(|b| b.to_string())
                .collect(),
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            git_timeout_secs: 30,
            stderr_limit_bytes: 100_000,
            kill_grace_millis: 2_000,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.agent_binary.trim().is_empty() {
            return Err(anyhow!("agent_binary must not be empty"));
        }
        if !(8..=MAX_DESCRIPTION_LEN).contains(&self.max_description_len) {
            return Err(anyhow!(
                "max_description_len must be between 8 and {MAX_DESCRIPTION_LEN}"
            ));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        if self.stderr_limit_bytes == 0 {
            return Err(anyhow!("stderr_limit_bytes must be > 0"));
        }
        if self.protected_branches.iter().any(|b| b.trim().is_empty()) {
            return Err(anyhow!("protected_branches must not contain empty names"));
        }
        Ok(())
    }

    pub fn branch_policy(&self) -> BranchPolicy {
        BranchPolicy {
            protected: self.protected_branches.clone(),
            max_description_len: self.max_description_len,
        }
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_millis)
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(
            &path,
            "agent_binary = \"/opt/agent/bin/claude\"\nprotected_branches = [\"trunk\"]\n",
        )
        .expect("write");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.agent_binary, "/opt/agent/bin/claude");
        assert_eq!(settings.protected_branches, vec!["trunk"]);
        assert_eq!(settings.max_description_len, DEFAULT_MAX_DESCRIPTION_LEN);
        assert!(settings.branch_policy().is_protected("trunk"));
        assert!(!settings.branch_policy().is_protected("main"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "git_timeout_secs = 0\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("git_timeout_secs"));
    }

    #[test]
    fn description_bound_is_capped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "max_description_len = 200\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_description_len"));

        fs::write(&path, format!("max_description_len = {MAX_DESCRIPTION_LEN}\n")).expect("write");
        assert_eq!(
            load_settings(&path).expect("load").max_description_len,
            MAX_DESCRIPTION_LEN
        );
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "agent_binary = [").expect("write");
        assert!(load_settings(&path).is_err());
    }
}
