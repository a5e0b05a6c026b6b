//! Terminal confirmation prompt.

use std::io::{BufRead, Write};

use buildrules_core::domain::{RuleRows, RulesError};
use buildrules_core::ports::{ConfirmationPrompt, is_affirmative};
use chrono::Utc;

use crate::render;

/// [`ConfirmationPrompt`] over a reader and a writer.
///
/// The CLI uses [`StdioPrompt::stdio`]; tests pass `Cursor`s.
pub struct StdioPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StdioPrompt<R, W> {
    /// Prompt reading answers from `input` and writing tables to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

impl StdioPrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConfirmationPrompt for StdioPrompt<R, W> {
    fn display(&mut self, rows: &RuleRows) -> Result<(), RulesError> {
        write!(self.output, "{}", render::rows_table(rows, Utc::now()))
            .and_then(|_| self.output.flush())
            .map_err(|e| RulesError::Prompt(format!("displaying rules failed: {e}")))
    }

    fn ask(&mut self, question: &str) -> Result<bool, RulesError> {
        write!(self.output, "{question} ")
            .and_then(|_| self.output.flush())
            .map_err(|e| RulesError::Prompt(e.to_string()))?;

        let mut answer = String::new();
        let read = self
            .input
            .read_line(&mut answer)
            .map_err(|e| RulesError::Prompt(format!("failed to read answer: {e}")))?;
        // EOF declines
        Ok(read > 0 && is_affirmative(&answer))
    }
}
