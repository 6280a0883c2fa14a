//! Terminal output helpers for consistent CLI formatting

use std::io::{self, Stdout, Write};

/// Check if color output is enabled
pub fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a warning message (yellow) to stderr
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {}", message);
    } else {
        eprintln!("Warning: {}", message);
    }
}

/// Report writer. Stdout in the binary, a buffer in tests.
pub struct Printer<W> {
    out: W,
    color: bool,
}

impl Printer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), use_color())
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Print a success message (green checkmark)
    pub fn success(&mut self, message: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.out, "\x1b[32m✓\x1b[0m {}", message)
        } else {
            writeln!(self.out, "OK: {}", message)
        }
    }

    /// Print an info message (blue)
    pub fn info(&mut self, message: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.out, "\x1b[34mℹ\x1b[0m {}", message)
        } else {
            writeln!(self.out, "Info: {}", message)
        }
    }

    /// Print a header with decorative border
    pub fn header(&mut self, title: &str) -> io::Result<()> {
        let border = "═".repeat(59);
        writeln!(self.out)?;
        writeln!(self.out, "{}", border)?;
        writeln!(self.out, "{:^59}", title)?;
        writeln!(self.out, "{}", border)?;
        writeln!(self.out)
    }

    /// Print a key-value pair with consistent formatting
    pub fn key_value(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.out, "  \x1b[1m{}:\x1b[0m {}", key, value)
        } else {
            writeln!(self.out, "  {}: {}", key, value)
        }
    }

    /// Print an unformatted line
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
