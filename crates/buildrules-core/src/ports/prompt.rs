//! ConfirmationPrompt port - where safe mode shows rules and asks the operator.
//!
//! Calls block the flow until the operator answers; there is no timeout.

use crate::domain::{RuleRows, RulesError};

/// Operator I/O used by safe mode.
///
/// # Implementations
/// - `StdioPrompt` in the CLI (stdin / stdout)
/// - scripted doubles in tests
pub trait ConfirmationPrompt {
    fn display(&mut self, rows: &RuleRows) -> Result<(), RulesError>;

    /// `Ok(true)` only for an affirmative answer. End of input is `Ok(false)`.
    fn ask(&mut self, question: &str) -> Result<bool, RulesError>;
}

/// Case-insensitive `y` / `yes`, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
