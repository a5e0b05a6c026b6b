//! Errors surfaced by the rule store, the gate and the confirmation flow.

use thiserror::Error;

/// Operational classification of a [`RulesError`].
///
/// - Transport: the store could not be reached (not retried automatically)
/// - Validation: the operation does not fit the current rules
/// - Concurrency: another writer won the race on the conflict token
/// - Policy: a force-gated precondition failed
/// - Ux: the operator declined, or the output mode cannot prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Validation,
    Concurrency,
    Policy,
    Ux,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("rule store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("conflict token is stale for task queue {task_queue}: the rules were modified by another writer")]
    ConflictTokenStale { task_queue: String },

    #[error("rule index {index} is out of range (task queue has {len} assignment rules)")]
    IndexOutOfRange { index: u32, len: usize },

    #[error("no redirect rule exists for source build id {source_build_id}")]
    NotFound { source_build_id: String },

    #[error("a redirect rule already exists for source build id {source_build_id}")]
    DuplicateSource { source_build_id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task queue already holds the maximum of {limit} {what}")]
    RuleLimitExceeded { what: &'static str, limit: usize },

    #[error("operation requires force: {reason}")]
    ForceRequired { reason: String },

    #[error("user denied confirmation")]
    UserDeclined,

    #[error("must bypass prompts when using structured output")]
    ConfirmationUnsupportedInStructuredOutput,

    #[error("confirmation prompt failed: {0}")]
    Prompt(String),

    /// Rendering the result for the operator failed.
    #[error("failed to render output: {0}")]
    Output(String),
}

impl RulesError {
    /// Classification used for exit codes and retry guidance.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RulesError::StoreUnavailable(_) => ErrorKind::Transport,
            RulesError::IndexOutOfRange { .. }
            | RulesError::NotFound { .. }
            | RulesError::DuplicateSource { .. }
            | RulesError::InvalidArgument(_)
            | RulesError::RuleLimitExceeded { .. } => ErrorKind::Validation,
            RulesError::ConflictTokenStale { .. } => ErrorKind::Concurrency,
            RulesError::ForceRequired { .. } => ErrorKind::Policy,
            RulesError::UserDeclined
            | RulesError::ConfirmationUnsupportedInStructuredOutput
            | RulesError::Prompt(_)
            | RulesError::Output(_) => ErrorKind::Ux,
        }
    }

    /// Operator guidance for errors that have an obvious next step.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RulesError::ConflictTokenStale { .. } => {
                Some("re-run the command to fetch the current rules and confirm again")
            }
            RulesError::ForceRequired { .. } => Some("pass --force to apply the change anyway"),
            RulesError::ConfirmationUnsupportedInStructuredOutput => {
                Some("pass --yes to skip the confirmation prompt")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::transport(RulesError::StoreUnavailable("down".into()), ErrorKind::Transport)]
    #[case::stale(RulesError::ConflictTokenStale { task_queue: "q".into() }, ErrorKind::Concurrency)]
    #[case::index(RulesError::IndexOutOfRange { index: 3, len: 1 }, ErrorKind::Validation)]
    #[case::not_found(RulesError::NotFound { source_build_id: "a".into() }, ErrorKind::Validation)]
    #[case::duplicate(RulesError::DuplicateSource { source_build_id: "a".into() }, ErrorKind::Validation)]
    #[case::force(RulesError::ForceRequired { reason: "r".into() }, ErrorKind::Policy)]
    #[case::declined(RulesError::UserDeclined, ErrorKind::Ux)]
    #[case::structured(RulesError::ConfirmationUnsupportedInStructuredOutput, ErrorKind::Ux)]
    #[case::output(RulesError::Output("encode".into()), ErrorKind::Ux)]
    fn errors_are_classified(#[case] err: RulesError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn retryable_and_policy_errors_carry_hints() {
        let stale = RulesError::ConflictTokenStale { task_queue: "q".into() };
        assert!(stale.hint().unwrap().contains("re-run"));

        let force = RulesError::ForceRequired { reason: "r".into() };
        assert!(force.hint().unwrap().contains("--force"));

        assert!(RulesError::UserDeclined.hint().is_none());
    }
}
