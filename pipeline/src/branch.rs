//! Branch management stage.
//!
//! Runs the adaptive analyzer (when enabled) and the branch classifier, then
//! decides where the work should happen:
//!
//! | current branch | trivial change | action                                  |
//! |----------------|----------------|-----------------------------------------|
//! | protected      | yes            | stay                                    |
//! | protected      | no             | create a uniquely named branch          |
//! | other          | any            | continue, warning on a likely mismatch  |
//!
//! Branch placement is an optimization, so every git problem is reported as a
//! warning and the stage still succeeds. It never switches away from a
//! non-protected branch.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::analyzer;
use crate::classifier::{self, resolve_branch_name};
use crate::core::branch_name::{BranchPolicy, branch_matches, find_similar_branches, strip_remote};
use crate::core::config::RunConfig;
use crate::core::types::{BranchAnalysis, StepRecommendation};
use crate::io::agent::Agent;
use crate::io::console;
use crate::io::git::Repository;
use crate::io::prompt::PromptEngine;

/// What the decision table asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchPlan {
    Stay,
    Create,
    Continue,
    Mismatch,
}

/// What the stage actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchAction {
    /// Trivial change on a protected branch.
    Stayed { branch: String },
    Created { branch: String },
    /// Dry run: the branch that would have been created.
    WouldCreate { branch: String },
    /// Creation failed; work continues on `current`.
    CreateFailed { branch: String, current: String },
    Continued { branch: String },
    /// Continuing on a branch that does not look related to the change.
    Mismatch { current: String, suggested: String },
    /// The current branch could not be determined.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOutcome {
    pub analysis: BranchAnalysis,
    pub recommendation: Option<StepRecommendation>,
    pub action: BranchAction,
    pub warnings: Vec<String>,
}

/// Decision table for a known current branch.
pub fn plan(current: &str, analysis: &BranchAnalysis, policy: &BranchPolicy) -> BranchPlan {
    if policy.is_protected(current) {
        if analysis.is_trivial {
            BranchPlan::Stay
        } else {
            BranchPlan::Create
        }
    } else if branch_matches(current, &analysis.suggested_name) {
        BranchPlan::Continue
    } else {
        BranchPlan::Mismatch
    }
}

#[instrument(skip_all, fields(adaptive = config.adaptive, dry_run = config.dry_run))]
pub fn manage_branch<A, R>(
    agent: &A,
    repo: &R,
    prompts: &PromptEngine,
    config: &RunConfig,
    policy: &BranchPolicy,
) -> Result<BranchOutcome>
where
    A: Agent + ?Sized,
    R: Repository + ?Sized,
{
    let recommendation = if config.adaptive {
        let recommendation = analyzer::analyze(agent, prompts, config)?;
        analyzer::announce(&recommendation);
        Some(recommendation)
    } else {
        None
    };

    let analysis = classifier::classify(agent, prompts, config, policy.max_description_len)?;
    console::info(&format!(
        "Change type: {}{}; suggested branch: {}",
        analysis.change_type,
        if analysis.is_trivial { " (trivial)" } else { "" },
        analysis.suggested_name
    ));

    let mut warnings = Vec::new();
    let action = match repo.current_branch() {
        Ok(current) => place(repo, config, policy, &analysis, current, &mut warnings),
        Err(err) => {
            warn_operator(
                &mut warnings,
                format!("could not determine the current branch ({err:#}); continuing"),
            );
            BranchAction::Unknown
        }
    };
    info!(?action, "branch management finished");

    Ok(BranchOutcome {
        analysis,
        recommendation,
        action,
        warnings,
    })
}

fn place<R: Repository + ?Sized>(
    repo: &R,
    config: &RunConfig,
    policy: &BranchPolicy,
    analysis: &BranchAnalysis,
    current: String,
    warnings: &mut Vec<String>,
) -> BranchAction {
    match plan(&current, analysis, policy) {
        BranchPlan::Stay => {
            console::info(&format!(
                "Trivial change on protected branch `{current}`; staying on it."
            ));
            BranchAction::Stayed { branch: current }
        }
        BranchPlan::Continue => {
            console::info(&format!("Continuing on branch `{current}`."));
            BranchAction::Continued { branch: current }
        }
        BranchPlan::Mismatch => {
            warn_operator(
                warnings,
                format!(
                    "current branch `{current}` may not match this change (suggested `{}`); continuing on it",
                    analysis.suggested_name
                ),
            );
            BranchAction::Mismatch {
                current,
                suggested: analysis.suggested_name.clone(),
            }
        }
        BranchPlan::Create => create(repo, config, analysis, current, warnings),
    }
}

fn create<R: Repository + ?Sized>(
    repo: &R,
    config: &RunConfig,
    analysis: &BranchAnalysis,
    current: String,
    warnings: &mut Vec<String>,
) -> BranchAction {
    let branch = match resolve_branch_name(repo, analysis) {
        Ok(name) => name,
        Err(err) => {
            warn_operator(
                warnings,
                format!("could not list existing branches ({err:#}); using the suggested name"),
            );
            analysis.suggested_name.clone()
        }
    };

    for similar in similar_remote_branches(repo, analysis) {
        warn_operator(
            warnings,
            format!("remote branch `{similar}` looks similar to `{branch}`; check it is not the same work"),
        );
    }

    if config.dry_run {
        console::info(&format!("[dry-run] would create branch `{branch}` from `{current}`"));
        return BranchAction::WouldCreate { branch };
    }

    if let Ok(true) = repo.has_uncommitted_changes() {
        warn_operator(
            warnings,
            format!("uncommitted changes on `{current}` will move to `{branch}`"),
        );
    }

    match repo.create_branch(&branch) {
        Ok(()) => {
            console::success(&format!("Created and switched to branch `{branch}`."));
            BranchAction::Created { branch }
        }
        Err(err) => {
            warn_operator(
                warnings,
                format!("could not create branch `{branch}` ({err:#}); continuing on `{current}`"),
            );
            BranchAction::CreateFailed { branch, current }
        }
    }
}

fn similar_remote_branches<R: Repository + ?Sized>(
    repo: &R,
    analysis: &BranchAnalysis,
) -> Vec<String> {
    let listing = repo
        .remotes()
        .and_then(|remotes| Ok((remotes, repo.remote_branches()?)));
    let (remotes, branches) = match listing {
        Ok(listing) => listing,
        Err(err) => {
            warn!(err = %err, "could not list remote branches");
            return Vec::new();
        }
    };
    let remotes: Vec<&str> = remotes.iter().map(String::as_str).collect();
    let stripped: Vec<String> = branches
        .iter()
        .map(|branch| strip_remote(branch, &remotes))
        .collect();
    find_similar_branches(&analysis.short_description, &stripped)
}

fn warn_operator(warnings: &mut Vec<String>, message: String) {
    warn!(%message, "branch management");
    console::warning(&message);
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ChangeType;
    use crate::io::agent::AgentReply;
    use crate::test_support::{FakeRepo, ScriptedAgent};

    fn classification(change_type: &str, trivial: bool, description: &str) -> AgentReply {
        AgentReply::succeeded(format!(
            "CHANGE_TYPE: {change_type}\nTRIVIAL: {}\nSHORT_DESCRIPTION: {description}",
            if trivial { "yes" } else { "no" }
        ))
    }

    fn run(agent: &ScriptedAgent, repo: &FakeRepo, config: &RunConfig) -> BranchOutcome {
        manage_branch(
            agent,
            repo,
            &PromptEngine::new(),
            config,
            &BranchPolicy::default(),
        )
        .expect("manage branch")
    }

    #[test]
    fn decision_table() {
        let policy = BranchPolicy::default();
        let feature = BranchAnalysis::new(ChangeType::Feature, false, "user auth", 40);
        let trivial = BranchAnalysis::new(ChangeType::Docs, true, "typo", 40);
        assert_eq!(plan("main", &trivial, &policy), BranchPlan::Stay);
        assert_eq!(plan("develop", &feature, &policy), BranchPlan::Create);
        assert_eq!(plan("feature/other", &feature, &policy), BranchPlan::Continue);
        assert_eq!(plan("bugfix-auth-flow", &feature, &policy), BranchPlan::Continue);
        assert_eq!(plan("spike/caching", &feature, &policy), BranchPlan::Mismatch);
    }

    #[test]
    fn creates_feature_branch_from_main() {
        let agent = ScriptedAgent::new(vec![classification("feature", false, "add-user-authentication")]);
        let repo = FakeRepo::on("main");
        let outcome = run(&agent, &repo, &RunConfig::new("add user authentication"));
        assert_eq!(
            outcome.action,
            BranchAction::Created {
                branch: "feature/add-user-authentication".to_string()
            }
        );
        assert_eq!(repo.checked_out().as_deref(), Some("feature/add-user-authentication"));
        assert!(outcome.warnings.is_empty());
        assert!(outcome.recommendation.is_none());
    }

    #[test]
    fn trivial_change_stays_on_protected_branch() {
        let agent = ScriptedAgent::new(vec![classification("docs", true, "fix-typo")]);
        let repo = FakeRepo::on("master");
        let outcome = run(&agent, &repo, &RunConfig::new("fix typo in README"));
        assert_eq!(
            outcome.action,
            BranchAction::Stayed {
                branch: "master".to_string()
            }
        );
        assert!(repo.created().is_empty());
    }

    #[test]
    fn collision_gets_numeric_suffix_and_similar_remote_warns() {
        let agent = ScriptedAgent::new(vec![classification("fix", false, "login-timeout")]);
        let repo = FakeRepo::on("main")
            .with_local(&["fix/login-timeout"])
            .with_remote(&["origin/hotfix/login-timeout"]);
        let outcome = run(&agent, &repo, &RunConfig::new("fix login timeout"));
        assert_eq!(
            outcome.action,
            BranchAction::Created {
                branch: "fix/login-timeout-2".to_string()
            }
        );
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("hotfix/login-timeout"));
    }

    #[test]
    fn mismatch_warns_but_never_switches() {
        let agent = ScriptedAgent::new(vec![classification("feature", false, "payment-export")]);
        let repo = FakeRepo::on("spike/caching");
        let outcome = run(&agent, &repo, &RunConfig::new("export payments"));
        assert!(matches!(outcome.action, BranchAction::Mismatch { .. }));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(repo.checked_out().as_deref(), Some("spike/caching"));
        assert!(repo.created().is_empty());
    }

    #[test]
    fn creation_failure_is_only_a_warning() {
        let agent = ScriptedAgent::new(vec![classification("feature", false, "search")]);
        let repo = FakeRepo::on("main").failing_create();
        let outcome = run(&agent, &repo, &RunConfig::new("add search"));
        assert!(matches!(outcome.action, BranchAction::CreateFailed { .. }));
        assert!(outcome.warnings[0].contains("continuing on `main`"));
        assert_eq!(repo.checked_out().as_deref(), Some("main"));
    }

    #[test]
    fn detached_head_is_only_a_warning() {
        let agent = ScriptedAgent::new(vec![classification("feature", false, "search")]);
        let outcome = run(&agent, &FakeRepo::detached(), &RunConfig::new("add search"));
        assert_eq!(outcome.action, BranchAction::Unknown);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn dry_run_reports_without_creating() {
        let agent = ScriptedAgent::new(Vec::new());
        let repo = FakeRepo::on("main");
        let config = RunConfig {
            dry_run: true,
            adaptive: true,
            ..RunConfig::new("add user authentication")
        };
        let outcome = run(&agent, &repo, &config);
        assert_eq!(
            outcome.action,
            BranchAction::WouldCreate {
                branch: "feature/add-user-authentication".to_string()
            }
        );
        assert!(repo.created().is_empty());
        assert!(agent.invocations().is_empty());
        assert!(outcome.recommendation.is_some());
    }

    #[test]
    fn adaptive_mode_analyzes_before_classifying() {
        let agent = ScriptedAgent::new(vec![
            AgentReply::succeeded("SKIP_CHANGELOG: yes\nREVIEW_ITERATIONS: 1"),
            classification("refactor", false, "split-parser"),
        ]);
        let repo = FakeRepo::on("main");
        let config = RunConfig {
            adaptive: true,
            ..RunConfig::new("split the parser module")
        };
        let outcome = run(&agent, &repo, &config);
        let rec = outcome.recommendation.expect("recommendation");
        assert!(rec.skip_changelog);
        assert_eq!(rec.review_iterations, 1);
        assert_eq!(outcome.analysis.suggested_name, "refactor/split-parser");
        assert_eq!(agent.invocations().len(), 2);
    }
}
