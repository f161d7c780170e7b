//! Agent process adapter.
//!
//! The [`Agent`] trait decouples stages from the actual agent backend (the
//! `claude` CLI). Tests use scripted agents that return predetermined replies
//! without spawning processes.
//!
//! One invocation owns one child process from spawn to reap. Its stdout is
//! read on a helper thread and forwarded as chunks over a channel; the same
//! channel carries operator interrupts, so the event loop handles output and
//! cancellation in arrival order.

use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::config::PermissionMode;
use crate::core::events::{AgentEvent, StreamDecoder};
use crate::exit_codes;
use crate::io::console;
use crate::io::display::StreamPrinter;
use crate::io::input;
use crate::io::process::{join_output, read_stream_limited};
use crate::io::signals;

/// Appended to every prompt so the agent leaves print mode when done.
pub const EXIT_INSTRUCTION: &str = "Once you have completed this task, exit.";

const DEFAULT_STDERR_LIMIT_BYTES: usize = 100_000;
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 10;

/// Whether decoded events are rendered while the agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Print the init banner, text and tool lines live.
    Stream,
    /// Decode and capture only.
    Quiet,
}

/// Parameters for one agent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub prompt: String,
    /// Resume the previous conversation instead of starting fresh.
    pub continuation: bool,
    pub permissions: PermissionMode,
    pub output: OutputMode,
}

impl AgentInvocation {
    pub fn new(prompt: impl Into<String>, permissions: PermissionMode) -> Self {
        Self {
            prompt: prompt.into(),
            continuation: false,
            permissions,
            output: OutputMode::Stream,
        }
    }

    pub fn continuing(mut self, continuation: bool) -> Self {
        self.continuation = continuation;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.output = OutputMode::Quiet;
        self
    }
}

/// Outcome of a completed (not interrupted) invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub success: bool,
    /// Text events, joined with newlines.
    pub output: String,
    pub exit_code: Option<i32>,
}

impl AgentReply {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            output: String::new(),
            exit_code,
        }
    }
}

/// The operator (or the agent itself) cancelled the run.
///
/// Travels inside `anyhow::Error`; recover it with `downcast_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// True if `err` (or anything in its chain) is an [`Interrupted`].
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<Interrupted>().is_some())
}

/// How an agent process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Interrupted,
    Failed(Option<i32>),
}

pub fn classify_exit(status: ExitStatus) -> ExitOutcome {
    match status.code() {
        Some(0) => ExitOutcome::Success,
        Some(exit_codes::INTERRUPTED) => ExitOutcome::Interrupted,
        Some(code) => ExitOutcome::Failed(Some(code)),
        None if killed_by_interrupt(status) => ExitOutcome::Interrupted,
        None => ExitOutcome::Failed(None),
    }
}

#[cfg(unix)]
fn killed_by_interrupt(status: ExitStatus) -> bool {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGKILL, SIGTERM};
    use std::os::unix::process::ExitStatusExt;
    matches!(status.signal(), Some(SIGINT | SIGTERM | SIGKILL | SIGHUP))
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: ExitStatus) -> bool {
    false
}

/// Argument list for one invocation. The prompt always comes last.
pub fn command_args(invocation: &AgentInvocation) -> Vec<String> {
    let mut args = Vec::new();
    match &invocation.permissions {
        PermissionMode::SkipAll => args.push("--dangerously-skip-permissions".to_string()),
        PermissionMode::Allowlist(tools) => {
            args.push("--allowedTools".to_string());
            args.push(tools.clone());
        }
        PermissionMode::Default => {}
    }
    if invocation.continuation {
        args.push("--continue".to_string());
    }
    args.extend(
        ["--output-format", "stream-json", "--verbose", "-p"]
            .into_iter()
            .map(str::to_string),
    );
    args.push(format!(
        "{}\n\n{EXIT_INSTRUCTION}",
        invocation.prompt.trim_end()
    ));
    args
}

/// Abstraction over agent backends.
pub trait Agent {
    /// Run one invocation to completion.
    ///
    /// A non-zero exit or a failed spawn is an `Ok` reply with
    /// `success == false`. Cancellation is an `Err` carrying [`Interrupted`].
    fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReply>;
}

enum LoopEvent {
    Chunk(Vec<u8>),
    StdoutClosed,
    Interrupt,
}

/// Agent backed by the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    binary: String,
    workdir: PathBuf,
    dry_run: bool,
    forward_stdin: bool,
    color: bool,
    stderr_limit: usize,
    kill_grace: Duration,
}

impl ClaudeAgent {
    pub fn new(binary: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workdir: workdir.into(),
            dry_run: false,
            forward_stdin: false,
            color: false,
            stderr_limit: DEFAULT_STDERR_LIMIT_BYTES,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Forward operator keystrokes into the agent.
    pub fn forward_stdin(mut self, forward: bool) -> Self {
        self.forward_stdin = forward;
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn stderr_limit(mut self, bytes: usize) -> Self {
        self.stderr_limit = bytes;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Drive a spawned child to completion.
    ///
    /// `events` must already be subscribed to interrupts; the child is always
    /// reaped before this returns.
    fn run_child(
        &self,
        mut child: Child,
        output: OutputMode,
        tx: Sender<LoopEvent>,
        events: Receiver<LoopEvent>,
    ) -> Result<AgentReply> {
        let result = self.drive(&mut child, output, tx, events);
        if let Err(err) = &result
            && !is_interrupted(err)
        {
            let _ = child.kill();
            let _ = child.wait();
        }
        result
    }

    fn drive(
        &self,
        child: &mut Child,
        output: OutputMode,
        tx: Sender<LoopEvent>,
        events: Receiver<LoopEvent>,
    ) -> Result<AgentReply> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        // Held until the child is reaped; keystrokes after that go nowhere.
        let _relay = match child.stdin.take() {
            Some(stdin) => Some(input::forward_to(stdin).context("forward operator input")?),
            None => None,
        };

        thread::spawn(move || pump_stdout(stdout, tx));
        let stderr_limit = self.stderr_limit;
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, stderr_limit));

        let mut decoder = StreamDecoder::new();
        let mut sink = EventSink::new(output, self.color);
        loop {
            match events.recv() {
                Ok(LoopEvent::Chunk(bytes)) => sink.accept(decoder.feed(&bytes)),
                Ok(LoopEvent::StdoutClosed) | Err(_) => break,
                Ok(LoopEvent::Interrupt) => return self.terminate(child),
            }
        }
        sink.accept(decoder.finish());

        let status = loop {
            if let Ok(LoopEvent::Interrupt) = events.try_recv() {
                return self.terminate(child);
            }
            if let Some(status) = child
                .wait_timeout(EXIT_POLL_INTERVAL)
                .context("wait for agent")?
            {
                break status;
            }
        };

        let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;
        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        if !stderr.trim().is_empty() {
            debug!(stderr_truncated, stderr = %stderr.trim_end(), "agent stderr");
        }

        let exit_code = status.code();
        match classify_exit(status) {
            ExitOutcome::Success => {
                debug!("agent completed successfully");
                Ok(AgentReply {
                    success: true,
                    output: sink.captured(),
                    exit_code,
                })
            }
            ExitOutcome::Interrupted => {
                warn!(exit_code = ?exit_code, "agent reported interruption");
                Err(Interrupted.into())
            }
            ExitOutcome::Failed(code) => {
                warn!(exit_code = ?code, "agent failed");
                report_failure(code, &stderr);
                Ok(AgentReply {
                    success: false,
                    output: sink.captured(),
                    exit_code: code,
                })
            }
        }
    }

    fn terminate(&self, child: &mut Child) -> Result<AgentReply> {
        warn!(pid = child.id(), "terminating agent after interrupt");
        if let Err(err) = child.kill() {
            debug!(err = %err, "kill after interrupt failed, agent probably exited");
        }
        match child
            .wait_timeout(self.kill_grace)
            .context("wait for agent after kill")?
        {
            Some(status) => debug!(exit_code = ?status.code(), "agent reaped"),
            None => {
                warn!(
                    grace = ?self.kill_grace,
                    "agent not reaped within grace period, blocking"
                );
                child.wait().context("wait for agent after kill")?;
            }
        }
        Err(Interrupted.into())
    }
}

impl Agent for ClaudeAgent {
    #[instrument(skip_all, fields(continuation = invocation.continuation, dry_run = self.dry_run))]
    fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReply> {
        let args = command_args(invocation);
        if self.dry_run {
            info!(binary = %self.binary, arg_count = args.len(), "dry run: agent not spawned");
            console::info(&format!(
                "[dry-run] would run: {} {}",
                self.binary,
                preview_args(&args)
            ));
            return Ok(AgentReply::succeeded(""));
        }

        signals::install()?;
        let (tx, events) = mpsc::channel();
        let interrupt_tx = tx.clone();
        let _guard = signals::on_interrupt(move || {
            let _ = interrupt_tx.send(LoopEvent::Interrupt);
        });

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.forward_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        info!(binary = %self.binary, workdir = %self.workdir.display(), "starting agent");
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(binary = %self.binary, err = %err, "failed to spawn agent");
                console::error(&format!("could not start agent `{}`: {err}", self.binary));
                return Ok(AgentReply::failed(None));
            }
        };
        self.run_child(child, invocation.output, tx, events)
    }
}

fn pump_stdout(mut stdout: ChildStdout, tx: Sender<LoopEvent>) {
    let mut chunk = [0u8; 8192];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(LoopEvent::Chunk(chunk[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(err = %err, "reading agent stdout failed");
                break;
            }
        }
    }
    let _ = tx.send(LoopEvent::StdoutClosed);
}

/// Routes decoded events to the printer and the capture buffer.
struct EventSink {
    printer: Option<StreamPrinter<io::Stdout>>,
    texts: Vec<String>,
}

impl EventSink {
    fn new(output: OutputMode, color: bool) -> Self {
        let printer = match output {
            OutputMode::Stream => Some(StreamPrinter::new(io::stdout(), color)),
            OutputMode::Quiet => None,
        };
        Self {
            printer,
            texts: Vec::new(),
        }
    }

    fn accept(&mut self, events: Vec<AgentEvent>) {
        for event in events {
            if let Some(printer) = self.printer.as_mut()
                && let Err(err) = printer.handle(&event)
            {
                debug!(err = %err, "failed to print agent event");
            }
            if let AgentEvent::Text(text) = event {
                self.texts.push(text);
            }
        }
    }

    fn captured(&self) -> String {
        self.texts.join("\n")
    }
}

fn report_failure(code: Option<i32>, stderr: &str) {
    match code {
        Some(code) => console::warning(&format!("agent exited with status {code}")),
        None => console::warning("agent was terminated by a signal"),
    }
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    for line in &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..] {
        console::info(&format!("  {line}"));
    }
}

/// Command preview with the prompt shortened to its first line.
fn preview_args(args: &[String]) -> String {
    let Some((prompt, rest)) = args.split_last() else {
        return String::new();
    };
    let first_line = prompt.lines().next().unwrap_or_default();
    let mut parts: Vec<String> = rest.to_vec();
    parts.push(format!("\"{first_line}...\""));
    parts.join(" ")
}
