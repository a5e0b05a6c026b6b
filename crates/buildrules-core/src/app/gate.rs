//! ConflictTokenGate - the fresh read every mutation starts from.

use tracing::debug;

use crate::domain::{RuleSet, RulesError, TaskQueueName};
use crate::ports::RuleStore;

/// Reads the current rules and their token. Holds no cache; every call is
/// one `get_rules` RPC.
pub struct ConflictTokenGate<'a> {
    store: &'a dyn RuleStore,
}

impl<'a> ConflictTokenGate<'a> {
    /// Gate reads through `store`, usually a connection just dialed.
    pub fn new(store: &'a dyn RuleStore) -> Self {
        Self { store }
    }

    /// One `get_rules` RPC. Transport errors are returned unchanged.
    pub async fn fetch_current(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError> {
        let rules = self.store.get_rules(task_queue).await?;
        debug!(
            task_queue = %task_queue,
            conflict_token = %rules.conflict_token,
            assignment_rules = rules.assignment_rules.len(),
            redirect_rules = rules.redirect_rules.len(),
            "fetched current rules"
        );
        Ok(rules)
    }
}
