//! `update-build-id-rules` subcommands.

use buildrules_core::app::{RulesClient, UpdateOptions};
use buildrules_core::domain::{
    BuildId, OutputMode, RampPercentage, RuleOperation, RuleSet, RulesError, TaskQueueName,
};
use buildrules_core::ports::{ConfirmationPrompt, StoreDialer};
use clap::{Args, Subcommand};

use crate::prompt::StdioPrompt;

#[derive(Debug, Args)]
pub struct Target {
    /// Task queue whose rules are changed
    #[arg(short = 't', long)]
    pub task_queue: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum UpdateCommand {
    /// Insert an assignment rule at an index (0 = highest priority)
    InsertAssignmentRule {
        #[arg(long)]
        build_id: String,

        /// Share of new tasks, 0-100; 100 means unconditional
        #[arg(long, default_value_t = 100.0)]
        percentage: f32,

        /// Position to insert at; past the end appends
        #[arg(short = 'i', long, default_value_t = 0)]
        rule_index: u32,

        #[command(flatten)]
        target: Target,
    },

    /// Replace the assignment rule at an index
    ReplaceAssignmentRule {
        #[arg(long)]
        build_id: String,

        #[arg(long, default_value_t = 100.0)]
        percentage: f32,

        #[arg(short = 'i', long)]
        rule_index: u32,

        /// Replace even if it leaves no unconditional rule
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        target: Target,
    },

    /// Delete the assignment rule at an index
    DeleteAssignmentRule {
        #[arg(short = 'i', long)]
        rule_index: u32,

        /// Delete even if its traffic would have no fallback
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        target: Target,
    },

    /// Add a redirect rule from a source build id
    AddRedirectRule {
        #[arg(long)]
        source_build_id: String,

        #[arg(long)]
        target_build_id: String,

        #[command(flatten)]
        target: Target,
    },

    /// Change the target of an existing redirect rule
    ReplaceRedirectRule {
        #[arg(long)]
        source_build_id: String,

        #[arg(long)]
        target_build_id: String,

        #[command(flatten)]
        target: Target,
    },

    /// Delete the redirect rule of a source build id
    DeleteRedirectRule {
        #[arg(long)]
        source_build_id: String,

        #[command(flatten)]
        target: Target,
    },

    /// Make a build id the unconditional default
    CommitBuildId {
        #[arg(long)]
        build_id: String,

        /// Commit even if no rule references the build id yet
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        target: Target,
    },
}

impl UpdateCommand {
    /// Task queue and `--yes` shared by every subcommand.
    pub fn target(&self) -> &Target {
        match self {
            UpdateCommand::InsertAssignmentRule { target, .. }
            | UpdateCommand::ReplaceAssignmentRule { target, .. }
            | UpdateCommand::DeleteAssignmentRule { target, .. }
            | UpdateCommand::AddRedirectRule { target, .. }
            | UpdateCommand::ReplaceRedirectRule { target, .. }
            | UpdateCommand::DeleteRedirectRule { target, .. }
            | UpdateCommand::CommitBuildId { target, .. } => target,
        }
    }

    /// Flags to [`RuleOperation`]. A percentage of 100 becomes "no ramp".
    ///
    /// # Errors
    /// `InvalidArgument` for blank build ids or a percentage outside 0-100.
    pub fn to_operation(&self) -> Result<RuleOperation, RulesError> {
        let op = match self {
            UpdateCommand::InsertAssignmentRule {
                build_id,
                percentage,
                rule_index,
                ..
            } => RuleOperation::InsertAssignment {
                rule_index: *rule_index,
                target_build_id: BuildId::parse(build_id)?,
                ramp: RampPercentage::from_percentage(*percentage)?,
            },
            UpdateCommand::ReplaceAssignmentRule {
                build_id,
                percentage,
                rule_index,
                force,
                ..
            } => RuleOperation::ReplaceAssignment {
                rule_index: *rule_index,
                target_build_id: BuildId::parse(build_id)?,
                ramp: RampPercentage::from_percentage(*percentage)?,
                force: *force,
            },
            UpdateCommand::DeleteAssignmentRule {
                rule_index, force, ..
            } => RuleOperation::DeleteAssignment {
                rule_index: *rule_index,
                force: *force,
            },
            UpdateCommand::AddRedirectRule {
                source_build_id,
                target_build_id,
                ..
            } => RuleOperation::AddRedirect {
                source_build_id: BuildId::parse(source_build_id)?,
                target_build_id: BuildId::parse(target_build_id)?,
            },
            UpdateCommand::ReplaceRedirectRule {
                source_build_id,
                target_build_id,
                ..
            } => RuleOperation::ReplaceRedirect {
                source_build_id: BuildId::parse(source_build_id)?,
                target_build_id: BuildId::parse(target_build_id)?,
            },
            UpdateCommand::DeleteRedirectRule {
                source_build_id, ..
            } => RuleOperation::DeleteRedirect {
                source_build_id: BuildId::parse(source_build_id)?,
            },
            UpdateCommand::CommitBuildId {
                build_id, force, ..
            } => RuleOperation::CommitBuildId {
                target_build_id: BuildId::parse(build_id)?,
                force: *force,
            },
        };
        Ok(op)
    }
}

/// Run one update against stdin/stdout and print the new rules.
pub async fn run<D: StoreDialer>(
    client: &RulesClient<D>,
    command: &UpdateCommand,
    output: OutputMode,
) -> Result<(), RulesError> {
    let updated = execute(client, command, output, &mut StdioPrompt::stdio()).await?;
    super::print_rules(&updated, output)?;
    if !output.is_structured() {
        println!("Successfully updated task queue build ID rules");
    }
    Ok(())
}

/// Build the operation from `command` and send it through `client`.
/// Returns the rules the store accepted.
pub async fn execute<D: StoreDialer>(
    client: &RulesClient<D>,
    command: &UpdateCommand,
    output: OutputMode,
    prompt: &mut dyn ConfirmationPrompt,
) -> Result<RuleSet, RulesError> {
    let target = command.target();
    let task_queue = TaskQueueName::parse(&target.task_queue)?;
    let operation = command.to_operation()?;
    let options = UpdateOptions {
        bypass_confirmation: target.yes,
        output,
    };
    let outcome = client
        .update_rules(&task_queue, operation, options, prompt)
        .await?;
    Ok(outcome.updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildrules_core::impls::InMemoryRuleStore;
    use clap::Parser;
    use std::io::Cursor;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: UpdateCommand,
    }

    fn parse(args: &[&str]) -> UpdateCommand {
        Harness::try_parse_from(std::iter::once("update").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    fn prompt(input: &str) -> StdioPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        StdioPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn insert_defaults_to_index_zero_and_no_ramp() {
        let cmd = parse(&["insert-assignment-rule", "--build-id", "id1", "-t", "q"]);
        assert_eq!(
            cmd.to_operation().unwrap(),
            RuleOperation::InsertAssignment {
                rule_index: 0,
                target_build_id: BuildId::parse("id1").unwrap(),
                ramp: None,
            }
        );
        assert!(!cmd.target().yes);
    }

    #[test]
    fn partial_percentage_becomes_a_ramp() {
        let cmd = parse(&[
            "replace-assignment-rule",
            "--build-id",
            "id2",
            "--percentage",
            "40",
            "--rule-index",
            "0",
            "--force",
            "-t",
            "q",
            "-y",
        ]);
        match cmd.to_operation().unwrap() {
            RuleOperation::ReplaceAssignment { ramp, force, .. } => {
                assert_eq!(ramp.map(|r| r.value()), Some(40.0));
                assert!(force);
            }
            other => panic!("unexpected operation {other:?}"),
        }
        assert!(cmd.target().yes);
    }

    #[test]
    fn out_of_range_percentage_is_rejected_before_any_call() {
        let cmd = parse(&["insert-assignment-rule", "--build-id", "id1", "--percentage", "150", "-t", "q"]);
        assert!(matches!(cmd.to_operation(), Err(RulesError::InvalidArgument(_))));
    }

    #[test]
    fn replace_requires_an_index() {
        let result = Harness::try_parse_from(["update", "replace-assignment-rule", "--build-id", "x", "-t", "q"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn confirmed_redirect_is_applied() {
        let store = InMemoryRuleStore::new();
        let client = RulesClient::new(store.clone());
        let cmd = parse(&[
            "add-redirect-rule",
            "--source-build-id",
            "id1",
            "--target-build-id",
            "id3",
            "-t",
            "q",
        ]);

        let mut p = prompt("y\n");
        let updated = execute(&client, &cmd, OutputMode::Table, &mut p).await.unwrap();
        assert_eq!(updated.redirect_rules.len(), 1);

        let shown = String::from_utf8(p.into_output()).unwrap();
        assert!(shown.contains("Current Redirect Rules:"));
        assert!(shown.contains("Continue with rules update adding a redirect rule? y/N"));
    }

    #[tokio::test]
    async fn json_without_yes_is_refused() {
        let store = InMemoryRuleStore::new();
        let client = RulesClient::new(store.clone());
        let cmd = parse(&["commit-build-id", "--build-id", "id1", "-t", "q"]);

        let err = execute(&client, &cmd, OutputMode::Json, &mut prompt("y\n"))
            .await
            .unwrap_err();
        assert_eq!(err, RulesError::ConfirmationUnsupportedInStructuredOutput);
        assert_eq!(store.rpc_count(), 0);
    }
}
