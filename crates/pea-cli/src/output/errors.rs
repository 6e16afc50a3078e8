//! Error message formatting with actionable suggestions.

use std::error::Error;

use pea_core::error::PeaError;
use super::ColorSupport;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a new error formatter
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with its suggestion and source chain
    pub fn format_error(&self, error: &PeaError) -> String {
        let mut output = format!("{}: {}\n", self.colors.red("error"), error);

        let mut source = error.source();
        while let Some(err) = source {
            output.push_str(&format!("{}: {}\n", self.colors.dim("caused by"), err));
            source = err.source();
        }

        if let Some(suggestion) = error.suggestion() {
            output.push_str(&format!("{}: {}\n", self.colors.yellow("help"), suggestion));
        }

        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}
