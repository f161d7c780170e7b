//! Live rendering of decoded agent events.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::core::events::{AgentEvent, tool_summary};

/// Prints agent events as they arrive.
///
/// The init banner is printed once per invocation. Text is printed verbatim.
/// A tool line is suppressed only when it is byte-identical to the tool line
/// printed immediately before it; any text in between resets that memory.
pub struct StreamPrinter<W: Write> {
    out: W,
    color: bool,
    banner_shown: bool,
    last_tool_line: Option<String>,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            banner_shown: false,
            last_tool_line: None,
        }
    }

    pub fn handle(&mut self, event: &AgentEvent) -> io::Result<()> {
        match event {
            AgentEvent::Init { session_id, model } => {
                if self.banner_shown {
                    return Ok(());
                }
                self.banner_shown = true;
                let mut line = String::from("agent session started");
                if let Some(model) = model {
                    line.push_str(&format!(" (model: {model})"));
                }
                if let Some(session_id) = session_id {
                    line.push_str(&format!(" [session {session_id}]"));
                }
                if self.color {
                    writeln!(self.out, "{}", line.dimmed())?;
                } else {
                    writeln!(self.out, "{line}")?;
                }
            }
            AgentEvent::Text(text) => {
                self.last_tool_line = None;
                if text.ends_with('\n') {
                    write!(self.out, "{text}")?;
                } else {
                    writeln!(self.out, "{text}")?;
                }
            }
            AgentEvent::ToolUse { name, input } => {
                let line = tool_summary(name, input);
                if self.last_tool_line.as_deref() == Some(line.as_str()) {
                    return Ok(());
                }
                if self.color {
                    writeln!(self.out, "  {} {}", "->".cyan(), line.cyan())?;
                } else {
                    writeln!(self.out, "  -> {line}")?;
                }
                self.last_tool_line = Some(line);
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
