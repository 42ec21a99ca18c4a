//! User-friendly diagnostic messages.
//!
//! Every failure surfaced to the user names the object kind/identifier
//! and attribute path where applicable, and carries a suggested
//! remediation where one exists.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no credentials resolve.
    pub const NO_CREDENTIALS: &str =
        "help: Pass --api-key, or --partner-key with --deployment-key (or set MOOR_API_KEY)";

    /// Suggestion when the output directory already has files.
    pub const OUTPUT_NOT_EMPTY: &str =
        "help: Pass --force to replace existing files, or choose an empty directory";

    /// Suggestion when the declarative engine binary is missing.
    pub const ENGINE_NOT_FOUND: &str =
        "help: Install the declarative engine or pass its path with --engine";

    /// Suggestion for fetch failures.
    pub const FETCH_FAILED: &str =
        "help: Check the deployment URL and credentials, then retry the export";

    /// Suggestion when verification reports drift.
    pub const DRIFT_DETECTED: &str =
        "help: Re-run `moor export` against the current live state and diff the artifacts";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            for suggestion in &self.suggestions {
                output.push_str(&format!("  {}\n", suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("fetch failed for connection `warehouse`")
            .with_context("GET /v1/connections returned 401")
            .with_suggestion(suggestions::FETCH_FAILED);

        let output = diag.format(false);
        assert!(output.contains("error: fetch failed"));
        assert!(output.contains("GET /v1/connections"));
        assert!(output.contains("help: Check the deployment URL"));
    }
}
