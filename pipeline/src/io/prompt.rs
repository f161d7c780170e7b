//! Prompt rendering for every agent call the pipeline makes.

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};
use tracing::trace;

use crate::core::review::NO_ISSUES_MARKER;
use crate::core::types::ReviewDepth;

const TEMPLATES: [(&str, &str); 10] = [
    ("understand", include_str!("prompts/understand.md")),
    ("implement", include_str!("prompts/implement.md")),
    ("simplify", include_str!("prompts/simplify.md")),
    ("review", include_str!("prompts/review.md")),
    ("solid", include_str!("prompts/solid.md")),
    ("test", include_str!("prompts/test.md")),
    ("commit", include_str!("prompts/commit.md")),
    ("changelog", include_str!("prompts/changelog.md")),
    ("classify_branch", include_str!("prompts/classify_branch.md")),
    ("analyze_steps", include_str!("prompts/analyze_steps.md")),
];

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .expect("built-in prompt template should be valid");
        }
        Self { env }
    }

    pub fn understand(&self, requirement: &str) -> Result<String> {
        self.render("understand", context! { requirement => requirement.trim() })
    }

    pub fn implement(&self, requirement: &str, understood: bool) -> Result<String> {
        self.render(
            "implement",
            context! { requirement => requirement.trim(), understood => understood },
        )
    }

    pub fn simplify(&self, requirement: &str) -> Result<String> {
        self.render("simplify", context! { requirement => requirement.trim() })
    }

    pub fn review(
        &self,
        requirement: &str,
        iteration: u8,
        total: u8,
        depth: ReviewDepth,
    ) -> Result<String> {
        self.render(
            "review",
            context! {
                requirement => requirement.trim(),
                iteration => iteration,
                total => total,
                depth => depth.as_str(),
                marker => NO_ISSUES_MARKER,
            },
        )
    }

    pub fn solid(&self, requirement: &str) -> Result<String> {
        self.render("solid", context! { requirement => requirement.trim() })
    }

    pub fn test(&self, requirement: &str) -> Result<String> {
        self.render("test", context! { requirement => requirement.trim() })
    }

    pub fn commit(&self, requirement: &str, push: bool) -> Result<String> {
        self.render(
            "commit",
            context! { requirement => requirement.trim(), push => push },
        )
    }

    pub fn changelog(&self, requirement: &str, push: bool) -> Result<String> {
        self.render(
            "changelog",
            context! { requirement => requirement.trim(), push => push },
        )
    }

    pub fn classify_branch(&self, requirement: &str) -> Result<String> {
        self.render("classify_branch", context! { requirement => requirement.trim() })
    }

    pub fn analyze_steps(&self, requirement: &str) -> Result<String> {
        self.render("analyze_steps", context! { requirement => requirement.trim() })
    }

    fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("load prompt template {name}"))?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render prompt template {name}"))?;
        trace!(template = name, len = rendered.len(), "rendered prompt");
        Ok(rendered)
    }
}
