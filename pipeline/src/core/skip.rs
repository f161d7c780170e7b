//! Stage plan and per-stage skip predicate.
//!
//! Priority, first match wins: implementation-only forced skip, explicit
//! flag, adaptive recommendation. `None` means the stage runs.

use crate::core::config::RunConfig;
use crate::core::types::{SkipReason, Stage, StepRecommendation};

pub fn skip_reason(
    stage: Stage,
    config: &RunConfig,
    recommendation: Option<&StepRecommendation>,
) -> Option<SkipReason> {
    if config.implementation_only && forced_off_in_implementation_only(stage) {
        return Some(SkipReason::ImplementationOnly);
    }
    if flag_disables(stage, config) {
        return Some(SkipReason::Flag);
    }
    if let Some(rec) = recommendation
        && adaptive_disables(stage, rec)
    {
        return Some(SkipReason::Adaptive);
    }
    None
}

fn forced_off_in_implementation_only(stage: Stage) -> bool {
    matches!(
        stage,
        Stage::BranchManagement
            | Stage::Understand
            | Stage::Simplify
            | Stage::Test
            | Stage::Commit
            | Stage::Changelog
    )
}

fn flag_disables(stage: Stage, config: &RunConfig) -> bool {
    match stage {
        Stage::BranchManagement => config.skip_branch_management,
        Stage::Test => config.skip_tests,
        _ => false,
    }
}

fn adaptive_disables(stage: Stage, rec: &StepRecommendation) -> bool {
    match stage {
        Stage::Simplify => rec.skip_simplify,
        Stage::Review => rec.skip_review,
        Stage::SolidCheck => rec.skip_solid,
        Stage::Test => rec.skip_tests,
        Stage::Changelog => rec.skip_changelog,
        _ => false,
    }
}

/// Stages that make up this run, in execution order.
///
/// The codebase-understanding stage is opt-in and only part of the plan when
/// requested.
pub fn planned_stages(config: &RunConfig) -> Vec<Stage> {
    Stage::ORDER
        .into_iter()
        .filter(|stage| *stage != Stage::Understand || config.understand)
        .collect()
}

/// Review iterations to run: the adaptive count when a recommendation is
/// active, otherwise the configured count.
pub fn review_iterations(config: &RunConfig, recommendation: Option<&StepRecommendation>) -> u8 {
    match recommendation {
        Some(rec) => rec.review_iterations,
        None => config.reviews,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec_skipping_everything() -> StepRecommendation {
        StepRecommendation {
            skip_simplify: true,
            skip_review: true,
            skip_solid: true,
            skip_tests: true,
            skip_changelog: true,
            review_iterations: 1,
            ..StepRecommendation::default()
        }
    }

    #[test]
    fn plain_config_runs_every_planned_stage() {
        let cfg = RunConfig::new("x");
        let plan = planned_stages(&cfg);
        assert!(!plan.contains(&Stage::Understand));
        assert_eq!(plan.len(), Stage::ORDER.len() - 1);
        for stage in plan {
            assert_eq!(skip_reason(stage, &cfg, None), None, "{stage} should run");
        }
    }

    #[test]
    fn understand_is_planned_only_on_request() {
        let cfg = RunConfig {
            understand: true,
            ..RunConfig::new("x")
        };
        assert_eq!(
            planned_stages(&cfg)[..3],
            [Stage::BranchManagement, Stage::Understand, Stage::Implement]
        );
        let impl_only = RunConfig {
            implementation_only: true,
            ..cfg
        }
        .apply_mode_overrides();
        assert_eq!(
            skip_reason(Stage::Understand, &impl_only, None),
            Some(SkipReason::ImplementationOnly)
        );
    }

    #[test]
    fn implementation_only_wins_over_flags_and_adaptive() {
        let cfg = RunConfig {
            implementation_only: true,
            ..RunConfig::new("x")
        }
        .apply_mode_overrides();
        let rec = rec_skipping_everything();
        assert_eq!(
            skip_reason(Stage::Test, &cfg, Some(&rec)),
            Some(SkipReason::ImplementationOnly)
        );
        assert_eq!(
            skip_reason(Stage::BranchManagement, &cfg, None),
            Some(SkipReason::ImplementationOnly)
        );
    }

    #[test]
    fn implementation_only_keeps_review_and_solid_check() {
        let cfg = RunConfig {
            implementation_only: true,
            ..RunConfig::new("x")
        }
        .apply_mode_overrides();
        assert_eq!(skip_reason(Stage::Implement, &cfg, None), None);
        assert_eq!(skip_reason(Stage::Review, &cfg, None), None);
        assert_eq!(skip_reason(Stage::SolidCheck, &cfg, None), None);
    }

    #[test]
    fn flag_wins_over_adaptive() {
        let cfg = RunConfig {
            skip_tests: true,
            ..RunConfig::new("x")
        };
        let rec = rec_skipping_everything();
        assert_eq!(
            skip_reason(Stage::Test, &cfg, Some(&rec)),
            Some(SkipReason::Flag)
        );
    }

    #[test]
    fn adaptive_skips_only_recommended_stages() {
        let cfg = RunConfig::new("x");
        let rec = StepRecommendation {
            skip_changelog: true,
            ..StepRecommendation::default()
        };
        assert_eq!(
            skip_reason(Stage::Changelog, &cfg, Some(&rec)),
            Some(SkipReason::Adaptive)
        );
        assert_eq!(skip_reason(Stage::Review, &cfg, Some(&rec)), None);
        assert_eq!(skip_reason(Stage::Commit, &cfg, Some(&rec)), None);
    }

    #[test]
    fn review_iterations_prefer_recommendation() {
        let cfg = RunConfig {
            reviews: 3,
            ..RunConfig::new("x")
        };
        assert_eq!(review_iterations(&cfg, None), 3);
        let rec = StepRecommendation {
            review_iterations: 1,
            ..StepRecommendation::default()
        };
        assert_eq!(review_iterations(&cfg, Some(&rec)), 1);
    }
}
