//! Console status output
//!
//! Status lines look like `[DeepSeek] message`, with the tag coloured
//! by severity. The console is passed explicitly to whoever prints.

use std::io::{self, IsTerminal, Stdout, Write};

use nu_ansi_term::{Color, Style};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

/// Default tag printed in front of status lines
pub const DEFAULT_TAG: &str = "DeepSeek";

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Progress,
    Success,
    Error,
}

impl Severity {
    fn color(self) -> Color {
        match self {
            Severity::Info => Color::Cyan,
            Severity::Progress => Color::Yellow,
            Severity::Success => Color::Green,
            Severity::Error => Color::Red,
        }
    }
}

/// Anything that can report progress of a flow
pub trait StatusSink {
    fn status(&mut self, message: &str, severity: Severity);
}

/// Styled console writer
pub struct Console<W: Write = Stdout> {
    out: W,
    tag: String,
    styled: bool,
    width: usize,
}

impl Console<Stdout> {
    /// Console on stdout; colours only when stdout is a terminal
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        let width = crossterm::terminal::size()
            .map(|(w, _)| w as usize)
            .unwrap_or(80);
        Self::new(out, styled, width)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, styled: bool, width: usize) -> Self {
        Self {
            out,
            tag: DEFAULT_TAG.to_string(),
            styled,
            width,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn is_styled(&self) -> bool {
        self.styled
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.styled {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Write and flush; failures are only logged
    fn emit(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            debug!("Console write failed: {}", e);
        }
    }

    /// `[tag] message`
    pub fn print_status(&mut self, message: &str, severity: Severity) {
        let tag = self.paint(severity.color().normal(), &format!("[{}]", self.tag));
        self.emit(&format!("{} {}\n", tag, message));
    }

    /// Labeled rule shown before a streamed reply
    pub fn print_response_start(&mut self) {
        let label = " Response ";
        let lead = "──";
        let used = lead.width() + label.width();
        let rest = "─".repeat(self.width.saturating_sub(used));

        let line = format!(
            "{}{}{}",
            self.paint(Color::Cyan.normal(), lead),
            self.paint(Color::Cyan.bold(), label),
            self.paint(Color::Cyan.normal(), &rest),
        );

        self.emit(&format!("\n{}\n\n", line));
    }

    pub fn print_goodbye(&mut self) {
        let goodbye = self.paint(Color::Yellow.normal(), "Goodbye!");
        self.emit(&format!("\n{}\n\n", goodbye));
    }
}

impl<W: Write> StatusSink for Console<W> {
    fn status(&mut self, message: &str, severity: Severity) {
        self.print_status(message, severity);
    }
}
