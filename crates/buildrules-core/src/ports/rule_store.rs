//! RuleStore port - the authoritative holder of every task queue's rules.
//!
//! Writes are guarded by the conflict token: the store must serialize
//! `update_rules` per task queue so that two writers presenting the same token
//! cannot both succeed.

use async_trait::async_trait;

use crate::domain::{ConflictToken, RuleOperation, RuleSet, RulesError, TaskQueueName};

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Current rules and token. An unknown task queue yields an empty rule set
    /// with a valid token.
    async fn get_rules(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError>;

    /// Apply `operation` if `conflict_token` is still current. Returns the new
    /// rules carrying a fresh token.
    async fn update_rules(
        &self,
        task_queue: &TaskQueueName,
        conflict_token: &ConflictToken,
        operation: &RuleOperation,
    ) -> Result<RuleSet, RulesError>;
}

/// Opens scoped store connections. Dropping the returned box releases the
/// connection.
#[async_trait]
pub trait StoreDialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn RuleStore>, RulesError>;
}
