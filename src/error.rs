// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operator-facing hints for the log.
//!
//! The agent runs headless, so the only place to tell the operator what went
//! wrong and what to try next is the log stream. An [`OperatorHint`] carries
//! a title, possible causes and numbered fixes, and renders either as one
//! block of text (fatal start-up errors on stderr) or as individual log lines.

use std::fmt;

/// Builder for a titled hint with causes and fixes.
///
/// # Example
///
/// ```
/// use tgdrop::error::OperatorHint;
///
/// let hint = OperatorHint::new("Greeting skipped: user 42 not in contacts")
///     .fix("Use channel mode (--channel) for a reliable greeting")
///     .fix("Add user 42 to the account's contacts")
///     .fix("Send any message from user 42 to the account first");
/// assert!(hint.to_string().contains("  2. Add user 42"));
/// ```
#[derive(Debug, Clone)]
pub struct OperatorHint {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl OperatorHint {
    /// Create a new hint with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Render as individual lines, title first.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone()];

        if !self.causes.is_empty() {
            lines.push("Possible causes:".to_string());
            lines.extend(self.causes.iter().map(|c| format!("  - {}", c)));
        }

        if !self.fixes.is_empty() {
            lines.push("Try:".to_string());
            lines.extend(
                self.fixes
                    .iter()
                    .enumerate()
                    .map(|(i, f)| format!("  {}. {}", i + 1, f)),
            );
        }

        lines
    }

    /// Emit every line at WARN level.
    pub fn log_warn(&self) {
        for line in self.lines() {
            tracing::warn!("{}", line);
        }
    }

    /// Emit every line at ERROR level.
    pub fn log_error(&self) {
        for line in self.lines() {
            tracing::error!("{}", line);
        }
    }
}

impl fmt::Display for OperatorHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[✗] {}", self.lines().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_lines() {
        let hint = OperatorHint::new("Could not send greeting to channel 77")
            .cause("Account is not a member of the channel")
            .fix("Join the channel with this account")
            .fix("Check the channel ID");

        let lines = hint.lines();
        assert_eq!(lines[0], "Could not send greeting to channel 77");
        assert_eq!(lines[1], "Possible causes:");
        assert_eq!(lines[2], "  - Account is not a member of the channel");
        assert_eq!(lines[3], "Try:");
        assert_eq!(lines[4], "  1. Join the channel with this account");
        assert_eq!(lines[5], "  2. Check the channel ID");
    }

    #[test]
    fn test_hint_display() {
        let hint = OperatorHint::new("Display test").fix("Fix");
        let rendered = hint.to_string();
        assert!(rendered.starts_with("[✗] Display test"));
        assert!(rendered.contains("  1. Fix"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let hint = OperatorHint::new("Bare");
        assert_eq!(hint.lines(), vec!["Bare".to_string()]);
        assert!(!hint.to_string().contains("Possible causes:"));
    }
}
