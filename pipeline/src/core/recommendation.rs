//! Decoding of the adaptive step analyzer's reply into a
//! [`StepRecommendation`].
//!
//! Every field falls back to its default independently; decoding never fails.

use crate::core::config::{DEFAULT_REVIEWS, MAX_REVIEWS, MIN_REVIEWS};
use crate::core::reply::{ReplyFields, parse_leading_number};
use crate::core::types::{ChangeType, Level, ReviewDepth, StepRecommendation};

pub const DEFAULT_RATIONALE: &str = "no rationale provided";
pub const DRY_RUN_RATIONALE: &str = "dry run: using default recommendation";

impl Default for StepRecommendation {
    fn default() -> Self {
        Self {
            skip_simplify: false,
            skip_review: false,
            skip_solid: false,
            skip_tests: false,
            skip_changelog: false,
            review_depth: ReviewDepth::Standard,
            review_iterations: DEFAULT_REVIEWS,
            rationale: DEFAULT_RATIONALE.to_string(),
            change_type: None,
            complexity: None,
            risk: None,
        }
    }
}

impl StepRecommendation {
    /// All-defaults recommendation carrying the reason the analysis was
    /// unavailable.
    pub fn fallback(reason: &str) -> Self {
        Self {
            rationale: format!("adaptive analysis unavailable ({reason}); running all stages"),
            ..Self::default()
        }
    }

    pub fn dry_run() -> Self {
        Self {
            rationale: DRY_RUN_RATIONALE.to_string(),
            ..Self::default()
        }
    }

    /// Names of the stages this recommendation skips.
    pub fn skipped_stages(&self) -> Vec<&'static str> {
        [
            (self.skip_simplify, "simplify"),
            (self.skip_review, "review"),
            (self.skip_solid, "solid-check"),
            (self.skip_tests, "test"),
            (self.skip_changelog, "changelog"),
        ]
        .into_iter()
        .filter_map(|(skip, name)| skip.then_some(name))
        .collect()
    }
}

/// Decode the analyzer reply.
///
/// Expected labels: `CHANGE_TYPE`, `COMPLEXITY`, `RISK`, `SKIP_SIMPLIFY`,
/// `SKIP_REVIEW`, `SKIP_SOLID`, `SKIP_TESTS`, `SKIP_CHANGELOG`,
/// `REVIEW_DEPTH`, `REVIEW_ITERATIONS`, `REASONING`.
pub fn parse_recommendation(reply: &str) -> StepRecommendation {
    let fields = ReplyFields::parse(reply);
    let defaults = StepRecommendation::default();

    StepRecommendation {
        skip_simplify: fields.bool("SKIP_SIMPLIFY").unwrap_or(defaults.skip_simplify),
        skip_review: fields.bool("SKIP_REVIEW").unwrap_or(defaults.skip_review),
        skip_solid: fields
            .bool("SKIP_SOLID")
            .or_else(|| fields.bool("SKIP_SOLID_CHECK"))
            .unwrap_or(defaults.skip_solid),
        skip_tests: fields.bool("SKIP_TESTS").unwrap_or(defaults.skip_tests),
        skip_changelog: fields
            .bool("SKIP_CHANGELOG")
            .unwrap_or(defaults.skip_changelog),
        review_depth: fields
            .get("REVIEW_DEPTH")
            .and_then(ReviewDepth::parse)
            .unwrap_or(defaults.review_depth),
        review_iterations: fields
            .get("REVIEW_ITERATIONS")
            .and_then(parse_leading_number)
            .map(clamp_iterations)
            .unwrap_or(defaults.review_iterations),
        rationale: fields
            .get("REASONING")
            .or_else(|| fields.get("RATIONALE"))
            .map(str::to_string)
            .unwrap_or(defaults.rationale),
        change_type: fields.get("CHANGE_TYPE").and_then(ChangeType::parse),
        complexity: fields.get("COMPLEXITY").and_then(Level::parse),
        risk: fields.get("RISK").and_then(Level::parse),
    }
}

fn clamp_iterations(value: u32) -> u8 {
    value.clamp(u32::from(MIN_REVIEWS), u32::from(MAX_REVIEWS)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = "\
Here is the classification you asked for.

CHANGE_TYPE: docs
COMPLEXITY: low
RISK: low
AFFECTED_AREAS: README
SKIP_SIMPLIFY: yes
SKIP_REVIEW: no
SKIP_SOLID: yes
SKIP_TESTS: yes
SKIP_CHANGELOG: no
REVIEW_DEPTH: minimal
REVIEW_ITERATIONS: 1
REASONING: Documentation-only change with no code paths affected.
";

    #[test]
    fn parses_complete_reply() {
        let rec = parse_recommendation(FULL_REPLY);
        assert!(rec.skip_simplify);
        assert!(!rec.skip_review);
        assert!(rec.skip_solid);
        assert!(rec.skip_tests);
        assert!(!rec.skip_changelog);
        assert_eq!(rec.review_depth, ReviewDepth::Minimal);
        assert_eq!(rec.review_iterations, 1);
        assert_eq!(
            rec.rationale,
            "Documentation-only change with no code paths affected."
        );
        assert_eq!(rec.change_type, Some(ChangeType::Docs));
        assert_eq!(rec.complexity, Some(Level::Low));
        assert_eq!(rec.risk, Some(Level::Low));
    }

    #[test]
    fn reply_without_fields_yields_exact_defaults() {
        let rec = parse_recommendation("I could not decide, sorry.\nPlease try again later");
        assert_eq!(rec, StepRecommendation::default());
    }

    #[test]
    fn empty_reply_yields_exact_defaults() {
        assert_eq!(parse_recommendation(""), StepRecommendation::default());
    }

    #[test]
    fn garbled_field_defaults_without_affecting_others() {
        let reply = "SKIP_TESTS: perhaps\nREVIEW_DEPTH: bottomless\nSKIP_CHANGELOG: yes";
        let rec = parse_recommendation(reply);
        assert!(!rec.skip_tests);
        assert_eq!(rec.review_depth, ReviewDepth::Standard);
        assert!(rec.skip_changelog);
    }

    #[test]
    fn annotated_values_parse_like_booleans_do() {
        let reply = "SKIP_TESTS: yes - docs only\nREVIEW_DEPTH: thorough - risky parser change\nRISK: High (auth)";
        let rec = parse_recommendation(reply);
        assert!(rec.skip_tests);
        assert_eq!(rec.review_depth, ReviewDepth::Thorough);
        assert_eq!(rec.risk, Some(Level::High));
    }

    #[test]
    fn review_iterations_are_clamped() {
        assert_eq!(
            parse_recommendation("REVIEW_ITERATIONS: 9").review_iterations,
            3
        );
        assert_eq!(
            parse_recommendation("REVIEW_ITERATIONS: 0").review_iterations,
            1
        );
        assert_eq!(
            parse_recommendation("REVIEW_ITERATIONS: many").review_iterations,
            DEFAULT_REVIEWS
        );
    }

    #[test]
    fn fallback_keeps_defaults_and_explains() {
        let rec = StepRecommendation::fallback("agent exited with status 1");
        assert!(rec.rationale.contains("agent exited with status 1"));
        assert_eq!(
            StepRecommendation {
                rationale: DEFAULT_RATIONALE.to_string(),
                ..rec
            },
            StepRecommendation::default()
        );
    }

    #[test]
    fn skipped_stages_lists_only_skips() {
        let rec = parse_recommendation(FULL_REPLY);
        assert_eq!(rec.skipped_stages(), vec!["simplify", "solid-check", "test"]);
    }
}
