//! Branch classifier.
//!
//! Asks the agent what kind of change a requirement is and derives a branch
//! name from the answer. Like the step analyzer it degrades to a
//! requirement-derived analysis instead of failing.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::branch_name::{strip_remote, unique_branch_name};
use crate::core::classification::parse_branch_analysis;
use crate::core::config::RunConfig;
use crate::core::types::BranchAnalysis;
use crate::io::agent::{Agent, AgentInvocation};
use crate::io::git::Repository;
use crate::io::prompt::PromptEngine;

#[instrument(skip_all, fields(dry_run = config.dry_run))]
pub fn classify<A: Agent + ?Sized>(
    agent: &A,
    prompts: &PromptEngine,
    config: &RunConfig,
    max_description_len: usize,
) -> Result<BranchAnalysis> {
    let fallback = || BranchAnalysis::from_requirement(&config.requirement, max_description_len);
    if config.dry_run {
        info!("dry run: deriving branch analysis from the requirement");
        return Ok(fallback());
    }

    let prompt = prompts.classify_branch(&config.requirement)?;
    let invocation = AgentInvocation::new(prompt, config.permission_mode()).quiet();
    let reply = agent.invoke(&invocation)?;
    if !reply.success || reply.output.trim().is_empty() {
        warn!(
            success = reply.success,
            "branch classification unavailable, deriving from requirement"
        );
        return Ok(fallback());
    }

    let analysis = parse_branch_analysis(&reply.output, &config.requirement, max_description_len);
    debug!(?analysis, "parsed branch analysis");
    Ok(analysis)
}

/// Every branch name in use locally or on a remote, remote prefix stripped.
pub fn existing_branch_names<R: Repository + ?Sized>(repo: &R) -> Result<HashSet<String>> {
    let mut names: HashSet<String> = repo.local_branches()?.into_iter().collect();
    let remotes = repo.remotes()?;
    let remotes: Vec<&str> = remotes.iter().map(String::as_str).collect();
    names.extend(
        repo.remote_branches()?
            .iter()
            .map(|branch| strip_remote(branch, &remotes)),
    );
    Ok(names)
}

/// The suggested name, suffixed until it collides with nothing in `repo`.
pub fn resolve_branch_name<R: Repository + ?Sized>(
    repo: &R,
    analysis: &BranchAnalysis,
) -> Result<String> {
    let existing = existing_branch_names(repo)?;
    let name = unique_branch_name(&analysis.suggested_name, &existing);
    if name != analysis.suggested_name {
        info!(suggested = %analysis.suggested_name, resolved = %name, "branch name taken, suffixed");
    }
    Ok(name)
}
