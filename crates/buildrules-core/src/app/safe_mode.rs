//! Safe mode - show the affected rules and ask before mutating.
//!
//! ```text
//! Idle -> Fetched -> Displayed -> Confirmed -> Sent
//!                             \-> Aborted
//! ```
//!
//! `Aborted` is terminal and means no update is sent.

use tracing::info;

use crate::domain::{ConflictToken, OutputMode, RuleOperation, RuleRows, RuleSet, RulesError};
use crate::ports::ConfirmationPrompt;

/// Where a confirmation flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeModeState {
    Idle,
    Fetched,
    Displayed,
    Confirmed,
    Aborted,
    Sent,
}

impl SafeModeState {
    fn can_advance_to(self, next: SafeModeState) -> bool {
        use SafeModeState::*;
        matches!(
            (self, next),
            (Idle, Fetched)
                | (Fetched, Displayed)
                | (Fetched, Aborted)
                | (Displayed, Confirmed)
                | (Displayed, Aborted)
                | (Confirmed, Sent)
        )
    }
}

/// One confirm-before-mutate flow, used for a single update.
///
/// # Example
/// ```ignore
/// let mut flow = SafeMode::begin(OutputMode::Table)?;
/// flow.fetched(&rules);
/// let token = flow.confirm(&operation, &mut prompt)?;
/// store.update_rules(&queue, &token, &operation).await?;
/// flow.sent();
/// ```
#[derive(Debug)]
pub struct SafeMode {
    state: SafeModeState,
    history: Vec<SafeModeState>,
    fetched: Option<RuleSet>,
}

impl SafeMode {
    /// Start a flow. A prompt cannot share stdout with structured output, so
    /// that combination fails here, before anything is fetched.
    pub fn begin(output: OutputMode) -> Result<Self, RulesError> {
        if output.is_structured() {
            return Err(RulesError::ConfirmationUnsupportedInStructuredOutput);
        }
        Ok(Self {
            state: SafeModeState::Idle,
            history: vec![SafeModeState::Idle],
            fetched: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> SafeModeState {
        self.state
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[SafeModeState] {
        &self.history
    }

    fn advance(&mut self, next: SafeModeState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal safe mode transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        self.history.push(next);
    }

    /// Rules recorded by [`SafeMode::fetched`], if any.
    pub fn fetched_rules(&self) -> Option<&RuleSet> {
        self.fetched.as_ref()
    }

    /// Record the rules just read through the gate. They are what
    /// [`SafeMode::confirm`] displays, and their token is the one the update
    /// will carry.
    pub fn fetched(&mut self, rules: &RuleSet) {
        self.fetched = Some(rules.clone());
        self.advance(SafeModeState::Fetched);
    }

    /// Show the fetched rows `operation` touches, ask, and hand back the
    /// fetched token on a yes.
    ///
    /// # Errors
    /// - `Prompt` when called before [`SafeMode::fetched`]
    /// - `UserDeclined` on any answer but yes
    /// - whatever the prompt itself fails with
    pub fn confirm(
        &mut self,
        operation: &RuleOperation,
        prompt: &mut dyn ConfirmationPrompt,
    ) -> Result<ConflictToken, RulesError> {
        let Some(rules) = self.fetched.as_ref() else {
            return Err(RulesError::Prompt(
                "cannot confirm before rules were fetched".to_string(),
            ));
        };
        let token = rules.conflict_token.clone();
        let rows = RuleRows::of(rules, operation.subset());
        if let Err(e) = prompt.display(&rows) {
            self.advance(SafeModeState::Aborted);
            return Err(e);
        }
        self.advance(SafeModeState::Displayed);

        let question = format!(
            "Continue with rules update {}? y/N",
            operation.description()
        );
        match prompt.ask(&question) {
            Ok(true) => {}
            Ok(false) => {
                self.advance(SafeModeState::Aborted);
                info!(operation = operation.name(), "rules update declined");
                return Err(RulesError::UserDeclined);
            }
            Err(e) => {
                self.advance(SafeModeState::Aborted);
                return Err(e);
            }
        }

        self.advance(SafeModeState::Confirmed);
        Ok(token)
    }

    /// The confirmed update was accepted by the store.
    pub fn sent(&mut self) {
        self.advance(SafeModeState::Sent);
    }
}
