//! Individual pipeline stages.
//!
//! Each stage renders its prompt, makes one agent call and maps the reply to
//! a [`StageResult`]. Classification calls (inside branch management) are
//! always fresh; the first work stage starts the agent conversation and every
//! later work stage continues it.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::branch::manage_branch;
use crate::core::branch_name::BranchPolicy;
use crate::core::config::RunConfig;
use crate::core::review::reports_no_issues;
use crate::core::types::{ReviewDepth, StageResult};
use crate::io::agent::{Agent, AgentInvocation};
use crate::io::git::Repository;
use crate::io::prompt::PromptEngine;

pub struct StageRunner<'a, A: Agent + ?Sized, R: Repository + ?Sized> {
    agent: &'a A,
    repo: &'a R,
    config: &'a RunConfig,
    policy: &'a BranchPolicy,
    prompts: PromptEngine,
    conversation_started: bool,
    understood: bool,
}

impl<'a, A: Agent + ?Sized, R: Repository + ?Sized> StageRunner<'a, A, R> {
    pub fn new(agent: &'a A, repo: &'a R, config: &'a RunConfig, policy: &'a BranchPolicy) -> Self {
        Self {
            agent,
            repo,
            config,
            policy,
            prompts: PromptEngine::new(),
            conversation_started: false,
            understood: false,
        }
    }

    /// Always succeeds; carries the branch analysis and, in adaptive mode,
    /// the step recommendation.
    pub fn branch_management(&mut self) -> Result<StageResult> {
        let outcome = manage_branch(
            self.agent,
            self.repo,
            &self.prompts,
            self.config,
            self.policy,
        )?;
        Ok(StageResult {
            success: true,
            recommendation: outcome.recommendation,
            branch: Some(outcome.analysis),
            ..StageResult::default()
        })
    }

    pub fn understand(&mut self) -> Result<StageResult> {
        let prompt = self.prompts.understand(&self.config.requirement)?;
        let result = self.work(prompt)?;
        self.understood = result.success;
        Ok(result)
    }

    pub fn implement(&mut self) -> Result<StageResult> {
        let prompt = self
            .prompts
            .implement(&self.config.requirement, self.understood)?;
        self.work(prompt)
    }

    pub fn simplify(&mut self) -> Result<StageResult> {
        let prompt = self.prompts.simplify(&self.config.requirement)?;
        self.work(prompt)
    }

    /// One review pass. `no_issues` is set when the agent reports a clean
    /// state.
    pub fn review(&mut self, iteration: u8, total: u8, depth: ReviewDepth) -> Result<StageResult> {
        let prompt = self
            .prompts
            .review(&self.config.requirement, iteration, total, depth)?;
        let mut result = self.work(prompt)?;
        result.no_issues = result.success && reports_no_issues(&result.output);
        debug!(iteration, no_issues = result.no_issues, "review pass finished");
        Ok(result)
    }

    pub fn solid_check(&mut self) -> Result<StageResult> {
        let prompt = self.prompts.solid(&self.config.requirement)?;
        self.work(prompt)
    }

    pub fn test(&mut self) -> Result<StageResult> {
        let prompt = self.prompts.test(&self.config.requirement)?;
        self.work(prompt)
    }

    pub fn commit(&mut self) -> Result<StageResult> {
        let prompt = self
            .prompts
            .commit(&self.config.requirement, !self.config.skip_push)?;
        self.work(prompt)
    }

    pub fn changelog(&mut self) -> Result<StageResult> {
        let prompt = self
            .prompts
            .changelog(&self.config.requirement, !self.config.skip_push)?;
        self.work(prompt)
    }

    #[instrument(skip_all, fields(continuation = self.conversation_started))]
    fn work(&mut self, prompt: String) -> Result<StageResult> {
        let invocation = AgentInvocation::new(prompt, self.config.permission_mode())
            .continuing(self.conversation_started);
        let reply = self.agent.invoke(&invocation)?;
        self.conversation_started = true;
        Ok(if reply.success {
            StageResult::succeeded(reply.output)
        } else {
            StageResult::failed(reply.output)
        })
    }
}
