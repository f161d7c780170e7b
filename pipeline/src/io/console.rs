//! Operator-facing status messages.
//!
//! Stage banners and warnings go to stdout so they interleave with the
//! streamed agent output; errors go to stderr. Colors are applied only when
//! the target stream supports them.

use owo_colors::{OwoColorize, Stream};

use crate::core::types::Stage;

pub fn stage_banner(stage: Stage, position: usize, total: usize) {
    let line = format!("==> [{position}/{total}] {}", stage.title());
    println!(
        "\n{}",
        line.if_supports_color(Stream::Stdout, |t| t.cyan().bold().to_string())
    );
}

pub fn info(message: &str) {
    println!("{message}");
}

pub fn success(message: &str) {
    println!(
        "{}",
        message.if_supports_color(Stream::Stdout, |t| t.green().to_string())
    );
}

pub fn skipped(stage: Stage, reason: &str) {
    let line = format!("--- {} skipped ({reason})", stage.title());
    println!(
        "{}",
        line.if_supports_color(Stream::Stdout, |t| t.dimmed().to_string())
    );
}

pub fn warning(message: &str) {
    let line = format!("warning: {message}");
    println!(
        "{}",
        line.if_supports_color(Stream::Stdout, |t| t.yellow().to_string())
    );
}

pub fn error(message: &str) {
    let line = format!("error: {message}");
    eprintln!(
        "{}",
        line.if_supports_color(Stream::Stderr, |t| t.red().to_string())
    );
}
