//! Adaptive step analyzer.
//!
//! Asks the agent which later stages a requirement needs and turns the reply
//! into a [`StepRecommendation`]. The analysis never fails the run: a failed
//! or empty agent call degrades to the default recommendation, with the
//! reason recorded in its rationale. Only an interrupt propagates.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::config::RunConfig;
use crate::core::recommendation::parse_recommendation;
use crate::core::types::StepRecommendation;
use crate::io::agent::{Agent, AgentInvocation};
use crate::io::console;
use crate::io::prompt::PromptEngine;

#[instrument(skip_all, fields(dry_run = config.dry_run))]
pub fn analyze<A: Agent + ?Sized>(
    agent: &A,
    prompts: &PromptEngine,
    config: &RunConfig,
) -> Result<StepRecommendation> {
    if config.dry_run {
        info!("dry run: using default step recommendation");
        return Ok(StepRecommendation::dry_run());
    }

    let prompt = prompts.analyze_steps(&config.requirement)?;
    let invocation = AgentInvocation::new(prompt, config.permission_mode()).quiet();
    let reply = agent.invoke(&invocation)?;

    if !reply.success {
        warn!(exit_code = ?reply.exit_code, "step analysis failed, using defaults");
        return Ok(StepRecommendation::fallback("step analysis agent call failed"));
    }
    if reply.output.trim().is_empty() {
        warn!("step analysis returned no text, using defaults");
        return Ok(StepRecommendation::fallback("step analysis reply was empty"));
    }

    let recommendation = parse_recommendation(&reply.output);
    debug!(?recommendation, "parsed step recommendation");
    Ok(recommendation)
}

/// Print the recommendation for the operator.
pub fn announce(recommendation: &StepRecommendation) {
    let mut summary = format!(
        "Adaptive plan: review {} x{}",
        recommendation.review_depth, recommendation.review_iterations
    );
    if let Some(change_type) = recommendation.change_type {
        summary.push_str(&format!(", change type {change_type}"));
    }
    if let Some(complexity) = recommendation.complexity {
        summary.push_str(&format!(", complexity {}", complexity.as_str()));
    }
    if let Some(risk) = recommendation.risk {
        summary.push_str(&format!(", risk {}", risk.as_str()));
    }
    console::info(&summary);

    let skipped = recommendation.skipped_stages();
    if !skipped.is_empty() {
        console::info(&format!("  skipping: {}", skipped.join(", ")));
    }
    console::info(&format!("  rationale: {}", recommendation.rationale));
}
