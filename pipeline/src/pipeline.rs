//! Pipeline orchestrator.
//!
//! Runs the planned stages strictly in order. Before each stage the skip
//! predicate is consulted; a stage that fails aborts the run immediately and
//! nothing is rolled back. The review stage is a bounded sub-loop that ends
//! early once a pass reports no issues.
//!
//! States only move forward:
//! `NotStarted → (Running(s) | Skipped(s))* → Completed | Aborted(s)`.
//! An interrupt is not a state: it propagates as an [`Interrupted`] error
//! and terminates the whole run.
//!
//! [`Interrupted`]: crate::io::agent::Interrupted

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use crate::core::branch_name::BranchPolicy;
use crate::core::config::RunConfig;
use crate::core::skip::{planned_stages, review_iterations, skip_reason};
use crate::core::types::{
    BranchAnalysis, Stage, StageRecord, StageResult, StageStatus, StepRecommendation,
};
use crate::exit_codes;
use crate::io::agent::Agent;
use crate::io::console;
use crate::io::git::Repository;
use crate::io::signals;
use crate::stages::StageRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    Running(Stage),
    Skipped(Stage),
    Completed,
    Aborted(Stage),
}

impl PipelineState {
    fn stage(self) -> Option<Stage> {
        match self {
            PipelineState::Running(stage)
            | PipelineState::Skipped(stage)
            | PipelineState::Aborted(stage) => Some(stage),
            PipelineState::NotStarted | PipelineState::Completed => None,
        }
    }

    /// True if `next` is a legal forward transition from `self`.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        let later = |stage: Stage| {
            self.stage()
                .is_none_or(|current| stage.index() > current.index())
        };
        let open = matches!(
            self,
            PipelineState::NotStarted | PipelineState::Running(_) | PipelineState::Skipped(_)
        );
        match next {
            PipelineState::Running(stage) | PipelineState::Skipped(stage) => open && later(stage),
            PipelineState::Completed => open,
            PipelineState::Aborted(stage) => self == PipelineState::Running(stage),
            PipelineState::NotStarted => false,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// One record per planned stage that was reached, in order.
    pub records: Vec<StageRecord>,
    pub final_state: PipelineState,
    pub branch: Option<BranchAnalysis>,
    pub recommendation: Option<StepRecommendation>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == PipelineState::Completed
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            exit_codes::OK
        } else {
            exit_codes::FAILED
        }
    }

    pub fn record(&self, stage: Stage) -> Option<&StageRecord> {
        self.records.iter().find(|record| record.stage == stage)
    }
}

struct Orchestrator<'c> {
    config: &'c RunConfig,
    state: PipelineState,
    records: Vec<StageRecord>,
    branch: Option<BranchAnalysis>,
    recommendation: Option<StepRecommendation>,
}

impl Orchestrator<'_> {
    fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            bail!("illegal pipeline transition {:?} -> {:?}", self.state, next);
        }
        info!(from = ?self.state, to = ?next, "pipeline transition");
        self.state = next;
        Ok(())
    }

    fn record(&mut self, stage: Stage, status: StageStatus, iterations: u32) {
        self.records.push(StageRecord {
            stage,
            status,
            iterations,
        });
    }

    fn into_report(self) -> PipelineReport {
        PipelineReport {
            records: self.records,
            final_state: self.state,
            branch: self.branch,
            recommendation: self.recommendation,
        }
    }

    /// Run the bounded review sub-loop. Returns the last pass result and the
    /// number of passes made.
    fn review_loop<A, R>(&self, runner: &mut StageRunner<'_, A, R>) -> Result<(StageResult, u32)>
    where
        A: Agent + ?Sized,
        R: Repository + ?Sized,
    {
        let total = review_iterations(self.config, self.recommendation.as_ref());
        let depth = self
            .recommendation
            .as_ref()
            .map(|rec| rec.review_depth)
            .unwrap_or_default();

        let mut last = StageResult::succeeded("");
        for iteration in 1..=total {
            console::info(&format!("Review pass {iteration}/{total} ({depth})"));
            let result = runner.review(iteration, total, depth)?;
            if !result.success {
                return Ok((result, u32::from(iteration)));
            }
            if result.no_issues {
                console::success(&format!(
                    "Review pass {iteration} found no issues; skipping remaining passes."
                ));
                return Ok((result, u32::from(iteration)));
            }
            last = result;
        }
        Ok((last, u32::from(total)))
    }
}

/// Run every planned stage for `config`.
///
/// Stage failures end the run with an aborted report; only an interrupt or
/// an internal error is returned as `Err`.
#[instrument(skip_all, fields(dry_run = config.dry_run, adaptive = config.adaptive))]
pub fn run_pipeline<A, R>(
    agent: &A,
    repo: &R,
    config: &RunConfig,
    policy: &BranchPolicy,
) -> Result<PipelineReport>
where
    A: Agent + ?Sized,
    R: Repository + ?Sized,
{
    signals::install()?;
    config.validate()?;

    let mut orchestrator = Orchestrator {
        config,
        state: PipelineState::NotStarted,
        records: Vec::new(),
        branch: None,
        recommendation: None,
    };
    let mut runner = StageRunner::new(agent, repo, config, policy);
    let plan = planned_stages(config);
    let total = plan.len();

    for (position, stage) in plan.into_iter().enumerate() {
        if let Some(reason) = skip_reason(stage, config, orchestrator.recommendation.as_ref()) {
            orchestrator.advance(PipelineState::Skipped(stage))?;
            console::skipped(stage, reason.describe());
            orchestrator.record(stage, StageStatus::Skipped(reason), 0);
            if stage == Stage::BranchManagement && config.adaptive {
                warn!("adaptive mode without branch management");
                console::warning(
                    "adaptive analysis runs during branch management, which is skipped; running every stage",
                );
            }
            continue;
        }

        orchestrator.advance(PipelineState::Running(stage))?;
        console::stage_banner(stage, position + 1, total);
        let (result, iterations) = match stage {
            Stage::BranchManagement => (runner.branch_management()?, 1),
            Stage::Understand => (runner.understand()?, 1),
            Stage::Implement => (runner.implement()?, 1),
            Stage::Simplify => (runner.simplify()?, 1),
            Stage::Review => orchestrator.review_loop(&mut runner)?,
            Stage::SolidCheck => (runner.solid_check()?, 1),
            Stage::Test => (runner.test()?, 1),
            Stage::Commit => (runner.commit()?, 1),
            Stage::Changelog => (runner.changelog()?, 1),
        };

        if stage == Stage::BranchManagement {
            orchestrator.branch = result.branch.clone();
            orchestrator.recommendation = result.recommendation.clone();
        }

        if !result.success {
            orchestrator.record(stage, StageStatus::Failed, iterations);
            orchestrator.advance(PipelineState::Aborted(stage))?;
            warn!(%stage, "stage failed, aborting run");
            console::error(&format!("{} failed; aborting the run", stage.title()));
            return Ok(orchestrator.into_report());
        }
        orchestrator.record(stage, StageStatus::Completed, iterations);
    }

    orchestrator.advance(PipelineState::Completed)?;
    Ok(orchestrator.into_report())
}

/// Print the stage timeline and closing notes.
pub fn print_summary(report: &PipelineReport, config: &RunConfig) {
    console::info("\nSummary:");
    for record in &report.records {
        let status = match record.status {
            StageStatus::Completed if record.stage == Stage::Review => {
                let plural = if record.iterations == 1 { "" } else { "es" };
                format!("completed ({} pass{plural})", record.iterations)
            }
            StageStatus::Completed => "completed".to_string(),
            StageStatus::Skipped(reason) => format!("skipped ({})", reason.describe()),
            StageStatus::Failed => "FAILED".to_string(),
        };
        console::info(&format!("  {:<24} {status}", record.stage.title()));
    }

    match report.final_state {
        PipelineState::Completed => {
            if config.implementation_only {
                console::warning(
                    "implementation-only mode: changes are uncommitted; review and commit them yourself",
                );
            }
            if config.dry_run {
                console::info("Dry run: no agent was started and no branch was created.");
            }
            console::success("Pipeline completed.");
        }
        PipelineState::Aborted(stage) => {
            console::error(&format!("Pipeline aborted at {}.", stage.title()));
        }
        state => warn!(?state, "summary printed for an unfinished run"),
    }
}
