//! Git facade for branch management.
//!
//! Answers branch/dirty-tree queries and creates branches through `git`
//! subprocess calls. Every call is bounded by a timeout.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::branch_name::validate_branch_name;
use crate::io::process::{CommandOutput, run_command_with_timeout};

const GIT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;
const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Repository queries and mutations branch management relies on.
pub trait Repository {
    /// Current branch name (errors on detached HEAD).
    fn current_branch(&self) -> Result<String>;
    fn has_uncommitted_changes(&self) -> Result<bool>;
    fn local_branches(&self) -> Result<Vec<String>>;
    /// Remote-tracking branches as `<remote>/<branch>`.
    fn remote_branches(&self) -> Result<Vec<String>>;
    /// Names of configured remotes.
    fn remotes(&self) -> Result<Vec<String>>;
    /// True if `name` exists locally or on any remote.
    fn branch_exists(&self, name: &str) -> Result<bool>;
    /// Create and check out `name` at the current HEAD.
    fn create_branch(&self, name: &str) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(output.stdout_lossy())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if output.timed_out {
            return Err(anyhow!("git {} timed out after {:?}", args.join(" "), self.timeout));
        }
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        run_command_with_timeout(cmd, self.timeout, GIT_OUTPUT_LIMIT_BYTES)
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl Repository for Git {
    #[instrument(skip_all)]
    fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["status", "--porcelain=v1"])?;
        Ok(out.lines().any(|line| !line.trim().is_empty()))
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["branch", "--format=%(refname:short)"])?;
        Ok(parse_branch_list(&out))
    }

    fn remote_branches(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["branch", "-r", "--format=%(refname:short)"])?;
        Ok(parse_branch_list(&out)
            .into_iter()
            .filter(|b| !b.ends_with("/HEAD") && b.contains('/'))
            .collect())
    }

    fn remotes(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["remote"])?;
        Ok(parse_branch_list(&out))
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let local = self
            .run(&[
                "show-ref",
                "--verify",
                "--quiet",
                &format!("refs/heads/{name}"),
            ])?
            .status
            .success();
        if local {
            return Ok(true);
        }
        let remotes = self.remotes()?;
        Ok(self.remote_branches()?.iter().any(|branch| {
            remotes.iter().any(|remote| {
                branch
                    .strip_prefix(remote.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    == Some(name)
            })
        }))
    }

    #[instrument(skip_all, fields(branch = name))]
    fn create_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        debug!("creating and checking out new branch");
        self.run_checked(&["checkout", "-b", name])?;
        Ok(())
    }
}

fn parse_branch_list(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("->"))
        .map(str::to_string)
        .collect()
}
