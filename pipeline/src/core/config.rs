//! Immutable per-invocation run configuration.
//!
//! Built once from CLI/env input by the binary, adjusted by
//! [`RunConfig::apply_mode_overrides`] and never mutated afterwards.

use std::path::PathBuf;

use anyhow::{Result, bail};

/// Default number of review iterations.
pub const DEFAULT_REVIEWS: u8 = 2;
/// Inclusive bounds for review iterations.
pub const MIN_REVIEWS: u8 = 1;
pub const MAX_REVIEWS: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Free-text description of the change to make.
    pub requirement: String,
    /// Review iterations when no adaptive recommendation is active.
    pub reviews: u8,
    pub dry_run: bool,
    pub skip_tests: bool,
    pub skip_push: bool,
    pub skip_branch_management: bool,
    pub adaptive: bool,
    pub skip_permissions: bool,
    pub implementation_only: bool,
    /// Run the opt-in codebase-understanding stage before implementing.
    pub understand: bool,
    /// Forward operator keystrokes into the agent process.
    pub interactive: bool,
    /// Comma-separated tool allowlist passed to the agent.
    pub allowed_tools: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            requirement: String::new(),
            reviews: DEFAULT_REVIEWS,
            dry_run: false,
            skip_tests: false,
            skip_push: false,
            skip_branch_management: false,
            adaptive: false,
            skip_permissions: false,
            implementation_only: false,
            understand: false,
            interactive: false,
            allowed_tools: None,
            log_file: None,
        }
    }
}

/// Effective permission arguments for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionMode {
    /// Let the agent prompt for permissions itself.
    Default,
    /// Restrict the agent to the given tool list.
    Allowlist(String),
    /// Skip every permission check.
    SkipAll,
}

impl RunConfig {
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            ..Self::default()
        }
    }

    /// Apply the overrides implied by mode flags. Idempotent.
    ///
    /// Implementation-only mode never touches branches, tests, or the remote.
    pub fn apply_mode_overrides(mut self) -> Self {
        if self.implementation_only {
            self.skip_branch_management = true;
            self.skip_tests = true;
            self.skip_push = true;
        }
        if self.skip_permissions {
            self.allowed_tools = None;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.requirement.trim().is_empty() {
            bail!("requirement must not be empty");
        }
        if !(MIN_REVIEWS..=MAX_REVIEWS).contains(&self.reviews) {
            bail!(
                "reviews must be between {MIN_REVIEWS} and {MAX_REVIEWS} (got {})",
                self.reviews
            );
        }
        Ok(())
    }

    /// Skip-all wins over an allowlist when both are configured.
    pub fn permission_mode(&self) -> PermissionMode {
        if self.skip_permissions {
            return PermissionMode::SkipAll;
        }
        match self.allowed_tools.as_deref().map(str::trim) {
            Some(tools) if !tools.is_empty() => PermissionMode::Allowlist(tools.to_string()),
            _ => PermissionMode::Default,
        }
    }
}
