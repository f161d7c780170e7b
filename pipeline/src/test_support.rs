//! Test-only helpers: a scripted agent, an in-memory repository and a
//! throwaway git repository.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::branch_name::validate_branch_name;
use crate::io::agent::{Agent, AgentInvocation, AgentReply, Interrupted};
use crate::io::git::Repository;

enum ScriptStep {
    Reply(AgentReply),
    Interrupt,
}

/// Agent that replays queued replies and records every invocation.
///
/// Once the queue is empty every call succeeds with no output.
pub struct ScriptedAgent {
    steps: RefCell<VecDeque<ScriptStep>>,
    invocations: RefCell<Vec<AgentInvocation>>,
}

impl ScriptedAgent {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            steps: RefCell::new(replies.into_iter().map(ScriptStep::Reply).collect()),
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Queue a reply after the ones already scripted.
    pub fn then(self, reply: AgentReply) -> Self {
        self.steps.borrow_mut().push_back(ScriptStep::Reply(reply));
        self
    }

    /// Queue an interrupt after the replies already scripted.
    pub fn then_interrupt(self) -> Self {
        self.steps.borrow_mut().push_back(ScriptStep::Interrupt);
        self
    }

    pub fn invocations(&self) -> Vec<AgentInvocation> {
        self.invocations.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|inv| inv.prompt.clone())
            .collect()
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReply> {
        self.invocations.borrow_mut().push(invocation.clone());
        match self.steps.borrow_mut().pop_front() {
            Some(ScriptStep::Reply(reply)) => Ok(reply),
            Some(ScriptStep::Interrupt) => Err(Interrupted.into()),
            None => Ok(AgentReply::succeeded("")),
        }
    }
}

/// In-memory [`Repository`].
pub struct FakeRepo {
    current: RefCell<Option<String>>,
    local: RefCell<Vec<String>>,
    remote: Vec<String>,
    dirty: bool,
    fail_create: bool,
    created: RefCell<Vec<String>>,
}

impl FakeRepo {
    /// Repository checked out on `branch`, which exists locally.
    pub fn on(branch: &str) -> Self {
        Self {
            current: RefCell::new(Some(branch.to_string())),
            local: RefCell::new(vec![branch.to_string()]),
            remote: Vec::new(),
            dirty: false,
            fail_create: false,
            created: RefCell::new(Vec::new()),
        }
    }

    pub fn detached() -> Self {
        let repo = Self::on("main");
        repo.current.replace(None);
        repo
    }

    pub fn with_local(self, branches: &[&str]) -> Self {
        self.local
            .borrow_mut()
            .extend(branches.iter().map(|b| b.to_string()));
        self
    }

    /// Remote-tracking branches as `<remote>/<branch>`.
    pub fn with_remote(mut self, branches: &[&str]) -> Self {
        self.remote.extend(branches.iter().map(|b| b.to_string()));
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn created(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    pub fn checked_out(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}

impl Repository for FakeRepo {
    fn current_branch(&self) -> Result<String> {
        self.current
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("detached HEAD"))
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(self.dirty)
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.local.borrow().clone())
    }

    fn remote_branches(&self) -> Result<Vec<String>> {
        Ok(self.remote.clone())
    }

    fn remotes(&self) -> Result<Vec<String>> {
        let mut remotes: Vec<String> = self
            .remote
            .iter()
            .filter_map(|b| b.split_once('/').map(|(remote, _)| remote.to_string()))
            .collect();
        remotes.sort();
        remotes.dedup();
        Ok(remotes)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.local.borrow().iter().any(|b| b == name)
            || self
                .remote
                .iter()
                .any(|b| b.split_once('/').is_some_and(|(_, rest)| rest == name)))
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        if self.fail_create {
            bail!("cannot lock ref 'refs/heads/{name}'");
        }
        if self.branch_exists(name)? {
            bail!("a branch named '{name}' already exists");
        }
        self.local.borrow_mut().push(name.to_string());
        self.created.borrow_mut().push(name.to_string());
        self.current.replace(Some(name.to_string()));
        Ok(())
    }
}

/// Git repository in a temp dir, on `main` with one commit.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        repo.git(&["config", "user.email", "pipeline@example.com"])?;
        repo.git(&["config", "user.name", "Pipeline Tests"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        fs::write(repo.root().join("README.md"), "# fixture\n").context("write README")?;
        repo.git(&["add", "README.md"])?;
        repo.git(&["commit", "--quiet", "-m", "initial commit"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Run git in the repository and return its stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
