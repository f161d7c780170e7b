//! Staged software-change pipeline.
//!
//! Takes a requirement and drives the agent through branch management,
//! implementation, review, tests and commit in the current repository.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use pipeline::core::config::{DEFAULT_REVIEWS, MAX_REVIEWS, MIN_REVIEWS, RunConfig};
use pipeline::exit_codes;
use pipeline::io::agent::{ClaudeAgent, is_interrupted};
use pipeline::io::config::{DEFAULT_SETTINGS_FILE, load_settings};
use pipeline::io::console;
use pipeline::io::git::Git;
use pipeline::logging;
use pipeline::pipeline::{print_summary, run_pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "pipeline",
    version,
    about = "Drive a coding agent through a staged change pipeline"
)]
struct Cli {
    /// What to build or change, in plain words.
    #[arg(required = true, num_args = 1..)]
    requirement: Vec<String>,

    /// Review passes to run when no adaptive plan is active.
    #[arg(
        long,
        env = "PIPELINE_REVIEWS",
        default_value_t = DEFAULT_REVIEWS,
        value_parser = clap::value_parser!(u8).range(i64::from(MIN_REVIEWS)..=i64::from(MAX_REVIEWS))
    )]
    reviews: u8,

    /// Print what would run without starting the agent or touching branches.
    #[arg(long, env = "PIPELINE_DRY_RUN")]
    dry_run: bool,

    #[arg(long, env = "PIPELINE_SKIP_TESTS")]
    skip_tests: bool,

    /// Commit without pushing.
    #[arg(long, env = "PIPELINE_SKIP_PUSH")]
    skip_push: bool,

    /// Work on the current branch without classifying the change.
    #[arg(long = "skip-branch", env = "PIPELINE_SKIP_BRANCH")]
    skip_branch_management: bool,

    /// Let the agent decide which stages this change needs.
    #[arg(long, env = "PIPELINE_ADAPTIVE")]
    adaptive: bool,

    /// Pass --dangerously-skip-permissions to the agent. Wins over --allowed-tools.
    #[arg(long, env = "PIPELINE_SKIP_PERMISSIONS")]
    skip_permissions: bool,

    /// Only implement and review; no branch, tests, commit or changelog.
    #[arg(long, env = "PIPELINE_IMPLEMENTATION_ONLY")]
    implementation_only: bool,

    /// Have the agent study the codebase before implementing.
    #[arg(long, env = "PIPELINE_UNDERSTAND")]
    understand: bool,

    /// Forward keystrokes to the agent while it runs.
    #[arg(long, env = "PIPELINE_INTERACTIVE")]
    interactive: bool,

    /// Comma-separated tools the agent may use without asking.
    #[arg(long, env = "PIPELINE_ALLOWED_TOOLS")]
    allowed_tools: Option<String>,

    /// Also write debug-level diagnostics to this file.
    #[arg(long, env = "PIPELINE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Project settings file.
    #[arg(long, env = "PIPELINE_CONFIG", default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            requirement: self.requirement.join(" ").trim().to_string(),
            reviews: self.reviews,
            dry_run: self.dry_run,
            skip_tests: self.skip_tests,
            skip_push: self.skip_push,
            skip_branch_management: self.skip_branch_management,
            adaptive: self.adaptive,
            skip_permissions: self.skip_permissions,
            implementation_only: self.implementation_only,
            understand: self.understand,
            interactive: self.interactive,
            allowed_tools: self.allowed_tools.clone(),
            log_file: self.log_file.clone(),
        }
        .apply_mode_overrides()
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) if is_interrupted(&err) => {
            console::error("interrupted");
            exit_codes::INTERRUPTED
        }
        Err(err) => {
            console::error(&format!("{err:#}"));
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let settings = load_settings(&cli.config)?;
    let config = cli.run_config();
    config.validate()?;
    debug!(?config, ?settings, "configuration resolved");

    let workdir = std::env::current_dir().context("resolve working directory")?;
    let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let git = Git::new(&workdir).with_timeout(settings.git_timeout());
    let agent = ClaudeAgent::new(settings.agent_binary.clone(), &workdir)
        .dry_run(config.dry_run)
        .forward_stdin(config.interactive)
        .color(color)
        .stderr_limit(settings.stderr_limit_bytes)
        .kill_grace(settings.kill_grace());

    console::info(&format!("Requirement: {}", config.requirement));
    if config.dry_run {
        console::info("Dry run: the agent will not be started.");
    }

    let report = run_pipeline(&agent, &git, &config, &settings.branch_policy())?;
    print_summary(&report, &config);
    Ok(report.exit_code())
}
