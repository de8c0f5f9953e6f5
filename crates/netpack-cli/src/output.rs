//! Colored diagnostics for CLI commands.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use netpack_engine::Message;

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Writes build diagnostics to stderr.
pub struct Diagnostics {
    stderr: StandardStream,
}

impl Diagnostics {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stderr: StandardStream::stderr(choice),
        }
    }

    fn badge(&mut self, label: &str, color: Color) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "{}", label);
        let _ = self.stderr.reset();
    }

    fn message(&mut self, label: &str, color: Color, message: &Message) {
        self.badge(label, color);
        let _ = writeln!(self.stderr, " {}", message.text);
        if let Some(file) = &message.file {
            let mut spec = ColorSpec::new();
            spec.set_dimmed(true);
            let _ = self.stderr.set_color(&spec);
            let _ = writeln!(self.stderr, "    in {}", file);
            let _ = self.stderr.reset();
        }
    }

    pub fn error(&mut self, message: &Message) {
        self.message("error:", Color::Red, message);
    }

    pub fn warning(&mut self, message: &Message) {
        self.message("warning:", Color::Yellow, message);
    }

    /// Green status line, e.g. after writing an output file
    pub fn success(&mut self, text: &str) {
        self.badge("done:", Color::Green);
        let _ = writeln!(self.stderr, " {}", text);
    }
}
