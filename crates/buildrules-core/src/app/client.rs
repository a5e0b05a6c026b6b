//! RulesClient - one read or one guarded mutation per call.
//!
//! Each call dials its own connection and drops it before returning, on
//! success and on every error path.

use tracing::{debug, warn};

use super::gate::ConflictTokenGate;
use super::safe_mode::SafeMode;
use crate::domain::{OutputMode, RuleOperation, RuleSet, RulesError, TaskQueueName};
use crate::ports::{ConfirmationPrompt, StoreDialer};

/// How the caller wants a mutation carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Skip safe mode entirely (`--yes`).
    pub bypass_confirmation: bool,
    pub output: OutputMode,
}

/// Rules before and after an accepted mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub previous: RuleSet,
    pub updated: RuleSet,
}

/// RulesClient runs the read and mutate commands against a dialed store.
///
/// # Flow of `update_rules`
/// 1. Validate the operation (no RPC)
/// 2. Refuse prompting under structured output (no RPC)
/// 3. Dial one connection, fetch rules and token through the gate
/// 4. Confirm unless bypassed
/// 5. Submit the operation with the fetched token
///
/// # Example
/// ```ignore
/// let client = RulesClient::new(InMemoryRuleStore::new());
/// let outcome = client.update_rules(&queue, op, options, &mut prompt).await?;
/// ```
pub struct RulesClient<D> {
    dialer: D,
}

impl<D: StoreDialer> RulesClient<D> {
    /// Create a client that dials `dialer` once per call.
    pub fn new(dialer: D) -> Self {
        Self { dialer }
    }

    /// The dialer this client opens connections with.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Current rules and token of `task_queue`, through a fresh connection.
    pub async fn get_rules(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError> {
        let conn = self.dialer.dial().await?;
        ConflictTokenGate::new(conn.as_ref())
            .fetch_current(task_queue)
            .await
    }

    /// Fetch, confirm unless bypassed, then submit `operation` with the token
    /// from the fetch. A stale token is returned as is; the caller decides
    /// whether to start over (and re-confirm against the new rules).
    pub async fn update_rules(
        &self,
        task_queue: &TaskQueueName,
        operation: RuleOperation,
        options: UpdateOptions,
        prompt: &mut dyn ConfirmationPrompt,
    ) -> Result<UpdateOutcome, RulesError> {
        operation.validate()?;
        let mut safe_mode = if options.bypass_confirmation {
            None
        } else {
            Some(SafeMode::begin(options.output)?)
        };

        let conn = self.dialer.dial().await?;
        let previous = ConflictTokenGate::new(conn.as_ref())
            .fetch_current(task_queue)
            .await?;

        let token = match safe_mode.as_mut() {
            Some(flow) => {
                flow.fetched(&previous);
                flow.confirm(&operation, prompt)?
            }
            None => previous.conflict_token.clone(),
        };

        debug!(
            task_queue = %task_queue,
            operation = operation.name(),
            conflict_token = %token,
            "submitting rules update"
        );
        let updated = conn
            .update_rules(task_queue, &token, &operation)
            .await
            .inspect_err(|e| {
                if let RulesError::ConflictTokenStale { .. } = e {
                    warn!(task_queue = %task_queue, "rules changed since they were fetched");
                }
            })?;
        if let Some(flow) = safe_mode.as_mut() {
            flow.sent();
        }

        Ok(UpdateOutcome { previous, updated })
    }
}
