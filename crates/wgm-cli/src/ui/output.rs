//! Styled status lines.

use crossterm::style::Stylize;
use std::io::Write;

/// Writes user-facing status lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, msg: &str) {
        println!("  {} {msg}", "•".blue());
    }

    pub fn success(&self, msg: &str) {
        println!("  {} {msg}", "✓".green());
    }

    pub fn warning(&self, msg: &str) {
        println!("  {} {msg}", "!".yellow().bold());
    }

    pub fn error(&self, msg: &str) {
        println!("  {} {msg}", "✗".red().bold());
    }

    /// Final line of a command.
    pub fn summary(&self, msg: &str) {
        println!();
        println!("{}", msg.bold());
    }
}

/// Ask a yes/no question on stdin. Anything but `y` is a no.
pub fn confirm(question: &str) -> std::io::Result<bool> {
    print!("  {} {question} (y/N) ", "WARNING:".bold().red());
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
