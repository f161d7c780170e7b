//! Shared deterministic types for the pipeline.
//!
//! These types define stable contracts between the orchestrator, the stage
//! runners and the reply parsers. They hold no I/O handles.

use std::fmt;

use crate::core::reply::leading_word;

/// Pipeline stages in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    BranchManagement,
    Understand,
    Implement,
    Simplify,
    Review,
    SolidCheck,
    Test,
    Commit,
    Changelog,
}

impl Stage {
    /// Every stage, in the order the orchestrator visits them.
    pub const ORDER: [Stage; 9] = [
        Stage::BranchManagement,
        Stage::Understand,
        Stage::Implement,
        Stage::Simplify,
        Stage::Review,
        Stage::SolidCheck,
        Stage::Test,
        Stage::Commit,
        Stage::Changelog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BranchManagement => "branch-management",
            Stage::Understand => "understand",
            Stage::Implement => "implement",
            Stage::Simplify => "simplify",
            Stage::Review => "review",
            Stage::SolidCheck => "solid-check",
            Stage::Test => "test",
            Stage::Commit => "commit",
            Stage::Changelog => "changelog",
        }
    }

    /// Human-readable title for console headers.
    pub fn title(self) -> &'static str {
        match self {
            Stage::BranchManagement => "Branch management",
            Stage::Understand => "Codebase understanding",
            Stage::Implement => "Implementation",
            Stage::Simplify => "Simplification",
            Stage::Review => "Code review",
            Stage::SolidCheck => "SOLID check",
            Stage::Test => "Tests",
            Stage::Commit => "Commit",
            Stage::Changelog => "Changelog",
        }
    }

    /// Position in [`Stage::ORDER`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a requirement describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeType {
    #[default]
    Feature,
    Fix,
    Refactor,
    Docs,
    Chore,
    Trivial,
}

impl ChangeType {
    pub fn parse(value: &str) -> Option<Self> {
        let change = match leading_word(value)?.as_str() {
            "feature" | "feat" => ChangeType::Feature,
            "fix" | "bugfix" | "bug" => ChangeType::Fix,
            "refactor" | "refactoring" => ChangeType::Refactor,
            "docs" | "doc" | "documentation" => ChangeType::Docs,
            "chore" => ChangeType::Chore,
            "trivial" => ChangeType::Trivial,
            _ => return None,
        };
        Some(change)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Feature => "feature",
            ChangeType::Fix => "fix",
            ChangeType::Refactor => "refactor",
            ChangeType::Docs => "docs",
            ChangeType::Chore => "chore",
            ChangeType::Trivial => "trivial",
        }
    }

    /// Branch-name prefix for this change type.
    ///
    /// Trivial changes that still end up on a branch are filed as chores.
    pub fn branch_prefix(self) -> &'static str {
        match self {
            ChangeType::Trivial => "chore",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How thoroughly the review stage should look at the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewDepth {
    Minimal,
    #[default]
    Standard,
    Thorough,
}

impl ReviewDepth {
    pub fn parse(value: &str) -> Option<Self> {
        match leading_word(value)?.as_str() {
            "minimal" | "light" | "quick" => Some(ReviewDepth::Minimal),
            "standard" | "normal" => Some(ReviewDepth::Standard),
            "thorough" | "deep" => Some(ReviewDepth::Thorough),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDepth::Minimal => "minimal",
            ReviewDepth::Standard => "standard",
            ReviewDepth::Thorough => "thorough",
        }
    }
}

impl fmt::Display for ReviewDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse low/medium/high rating used for complexity and risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn parse(value: &str) -> Option<Self> {
        match leading_word(value)?.as_str() {
            "low" => Some(Level::Low),
            "medium" | "moderate" => Some(Level::Medium),
            "high" => Some(Level::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

/// Which stages to run and how deeply to review, as recommended by the
/// adaptive step analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecommendation {
    pub skip_simplify: bool,
    pub skip_review: bool,
    pub skip_solid: bool,
    pub skip_tests: bool,
    pub skip_changelog: bool,
    pub review_depth: ReviewDepth,
    /// Always within `1..=3`.
    pub review_iterations: u8,
    pub rationale: String,
    pub change_type: Option<ChangeType>,
    pub complexity: Option<Level>,
    pub risk: Option<Level>,
}

/// Branch classification of a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchAnalysis {
    pub change_type: ChangeType,
    pub is_trivial: bool,
    /// Lowercase, `[a-z0-9-]` only, bounded length.
    pub short_description: String,
    pub prefix: String,
    /// `<prefix>/<short_description>`.
    pub suggested_name: String,
}

/// Uniform result returned by every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    pub success: bool,
    /// Review stages: the agent reported a clean state.
    pub no_issues: bool,
    /// Branch stage: recommendation from the adaptive analyzer.
    pub recommendation: Option<StepRecommendation>,
    /// Branch stage: classification of the requirement.
    pub branch: Option<BranchAnalysis>,
    /// Text captured from the agent.
    pub output: String,
}

impl StageResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            ..Self::default()
        }
    }
}

/// Why a stage did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Implementation-only mode forces the stage off.
    ImplementationOnly,
    /// An explicit CLI/env flag turned the stage off.
    Flag,
    /// The adaptive recommendation turned the stage off.
    Adaptive,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::ImplementationOnly => "implementation-only mode",
            SkipReason::Flag => "disabled by flag",
            SkipReason::Adaptive => "adaptive recommendation",
        }
    }
}

/// Final status of one stage in the run timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Skipped(SkipReason),
    Failed,
}

/// One entry in the run timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    /// Review passes for the review stage, 1 for any other stage that ran,
    /// 0 when skipped.
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_matches_indices() {
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn change_type_parses_aliases() {
        assert_eq!(ChangeType::parse(" Feat "), Some(ChangeType::Feature));
        assert_eq!(ChangeType::parse("bugfix"), Some(ChangeType::Fix));
        assert_eq!(ChangeType::parse("documentation"), Some(ChangeType::Docs));
        assert_eq!(ChangeType::parse("rewrite"), None);
    }

    #[test]
    fn parsers_ignore_trailing_commentary() {
        assert_eq!(
            ChangeType::parse("fix (null deref in parser)"),
            Some(ChangeType::Fix)
        );
        assert_eq!(ChangeType::parse("Fix."), Some(ChangeType::Fix));
        assert_eq!(
            ReviewDepth::parse("thorough - risky parser change"),
            Some(ReviewDepth::Thorough)
        );
        assert_eq!(Level::parse("High, touches auth"), Some(Level::High));
        assert_eq!(ChangeType::parse("  "), None);
    }

    #[test]
    fn trivial_changes_use_chore_prefix() {
        assert_eq!(ChangeType::Trivial.branch_prefix(), "chore");
        assert_eq!(ChangeType::Fix.branch_prefix(), "fix");
    }

    #[test]
    fn review_depth_defaults_to_standard() {
        assert_eq!(ReviewDepth::default(), ReviewDepth::Standard);
        assert_eq!(ReviewDepth::parse("THOROUGH"), Some(ReviewDepth::Thorough));
        assert_eq!(ReviewDepth::parse("extreme"), None);
    }
}
