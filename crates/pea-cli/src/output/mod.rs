//! Terminal output formatting and utilities.
//!
//! Keeps output consistent across commands. Colors respect the NO_COLOR
//! environment variable and are only used when both streams are terminals.

use std::env;
use std::io::{self, IsTerminal};

pub mod errors;

/// Color support detection and formatting
#[derive(Debug, Clone, Copy)]
pub struct ColorSupport {
    enabled: bool,
}

impl ColorSupport {
    /// Detect color support automatically
    pub fn detect() -> Self {
        let enabled = env::var_os("NO_COLOR").is_none()
            && io::stderr().is_terminal()
            && io::stdout().is_terminal();
        Self { enabled }
    }

    /// Never emit escape codes
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, code: u8, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(32, text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(33, text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(31, text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint(2, text)
    }
}

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: ColorSupport,
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        println!("{}", message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        println!("{} {}", self.colors.green("✓"), message);
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
