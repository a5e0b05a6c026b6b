//! The closed set of rule mutations a client can request.

use serde::{Deserialize, Serialize};

use super::errors::RulesError;
use super::ids::BuildId;
use super::rules::RampPercentage;

/// One mutation of a task queue's rules, applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleOperation {
    /// Insert at `rule_index`; an index past the end appends.
    InsertAssignment {
        rule_index: u32,
        target_build_id: BuildId,
        ramp: Option<RampPercentage>,
    },

    /// Replace the rule at an existing `rule_index`.
    ReplaceAssignment {
        rule_index: u32,
        target_build_id: BuildId,
        ramp: Option<RampPercentage>,
        force: bool,
    },

    /// Delete the rule at an existing `rule_index`.
    DeleteAssignment { rule_index: u32, force: bool },

    AddRedirect {
        source_build_id: BuildId,
        target_build_id: BuildId,
    },

    ReplaceRedirect {
        source_build_id: BuildId,
        target_build_id: BuildId,
    },

    DeleteRedirect { source_build_id: BuildId },

    /// Make `target_build_id` the unconditional default, dropping its own
    /// earlier rules and every other unconditional rule.
    CommitBuildId { target_build_id: BuildId, force: bool },
}

/// Which half of a rule set an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSubset {
    Assignment,
    Redirect,
}

impl RuleOperation {
    /// Stable snake_case name, used in logs and as the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            RuleOperation::InsertAssignment { .. } => "insert_assignment",
            RuleOperation::ReplaceAssignment { .. } => "replace_assignment",
            RuleOperation::DeleteAssignment { .. } => "delete_assignment",
            RuleOperation::AddRedirect { .. } => "add_redirect",
            RuleOperation::ReplaceRedirect { .. } => "replace_redirect",
            RuleOperation::DeleteRedirect { .. } => "delete_redirect",
            RuleOperation::CommitBuildId { .. } => "commit_build_id",
        }
    }

    /// Phrase used in the confirmation question.
    pub fn description(&self) -> &'static str {
        match self {
            RuleOperation::InsertAssignment { .. } => "inserting an assignment rule",
            RuleOperation::ReplaceAssignment { .. } => "replacing an assignment rule",
            RuleOperation::DeleteAssignment { .. } => "deleting an assignment rule",
            RuleOperation::AddRedirect { .. } => "adding a redirect rule",
            RuleOperation::ReplaceRedirect { .. } => "replacing a redirect rule",
            RuleOperation::DeleteRedirect { .. } => "deleting a redirect rule",
            RuleOperation::CommitBuildId { .. } => "committing a build id",
        }
    }

    /// The table safe mode shows before this operation: assignment rules for
    /// assignment and commit operations, redirect rules otherwise.
    pub fn subset(&self) -> RuleSubset {
        match self {
            RuleOperation::InsertAssignment { .. }
            | RuleOperation::ReplaceAssignment { .. }
            | RuleOperation::DeleteAssignment { .. }
            | RuleOperation::CommitBuildId { .. } => RuleSubset::Assignment,
            RuleOperation::AddRedirect { .. }
            | RuleOperation::ReplaceRedirect { .. }
            | RuleOperation::DeleteRedirect { .. } => RuleSubset::Redirect,
        }
    }

    /// Checks that need no knowledge of the current rules.
    pub fn validate(&self) -> Result<(), RulesError> {
        match self {
            RuleOperation::InsertAssignment {
                target_build_id,
                ramp,
                ..
            }
            | RuleOperation::ReplaceAssignment {
                target_build_id,
                ramp,
                ..
            } => {
                require_name(target_build_id, "target build id")?;
                if let Some(ramp) = ramp {
                    RampPercentage::new(ramp.value())?;
                }
                Ok(())
            }
            RuleOperation::DeleteAssignment { .. } => Ok(()),
            RuleOperation::AddRedirect {
                source_build_id,
                target_build_id,
            }
            | RuleOperation::ReplaceRedirect {
                source_build_id,
                target_build_id,
            } => {
                require_name(source_build_id, "source build id")?;
                require_name(target_build_id, "target build id")?;
                if source_build_id == target_build_id {
                    return Err(RulesError::InvalidArgument(format!(
                        "redirect rule cannot point build id {source_build_id} at itself"
                    )));
                }
                Ok(())
            }
            RuleOperation::DeleteRedirect { source_build_id } => {
                require_name(source_build_id, "source build id")
            }
            RuleOperation::CommitBuildId {
                target_build_id, ..
            } => require_name(target_build_id, "target build id"),
        }
    }
}

fn require_name(id: &BuildId, what: &str) -> Result<(), RulesError> {
    if id.is_blank() {
        return Err(RulesError::InvalidArgument(format!("{what} is required")));
    }
    Ok(())
}
