//! RuleTable - every task queue's rules, shared by the reference stores.
//!
//! The table itself is not synchronized; each store wraps it in its own lock
//! so that the token check and the write happen under one critical section.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    ConflictToken, RuleLimits, RuleOperation, RuleSet, RulesError, TaskQueueName, engine,
};
use crate::ports::TokenGenerator;

/// Rule sets keyed by task queue; serialized as-is into the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    queues: BTreeMap<TaskQueueName, RuleSet>,
}

impl RuleTable {
    /// Empty table with no task queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current rules of `task_queue`, creating an empty set on first use.
    /// Returns `true` alongside when the set was just created.
    pub fn get_or_create(
        &mut self,
        task_queue: &TaskQueueName,
        tokens: &dyn TokenGenerator,
    ) -> (RuleSet, bool) {
        if let Some(rules) = self.queues.get(task_queue) {
            return (rules.clone(), false);
        }
        let rules = RuleSet::empty(task_queue.clone(), tokens.next_token());
        debug!(task_queue = %task_queue, "created empty rule set");
        self.queues.insert(task_queue.clone(), rules.clone());
        (rules, true)
    }

    /// Token check, engine, fresh token. Nothing changes on error.
    pub fn update(
        &mut self,
        task_queue: &TaskQueueName,
        conflict_token: &ConflictToken,
        operation: &RuleOperation,
        now: DateTime<Utc>,
        limits: &RuleLimits,
        tokens: &dyn TokenGenerator,
    ) -> Result<RuleSet, RulesError> {
        let (current, _) = self.get_or_create(task_queue, tokens);
        if &current.conflict_token != conflict_token {
            return Err(RulesError::ConflictTokenStale {
                task_queue: task_queue.to_string(),
            });
        }

        let mut next = engine::apply(&current, operation, now, limits)?;
        next.conflict_token = tokens.next_token();
        self.queues.insert(task_queue.clone(), next.clone());
        Ok(next)
    }

    /// Number of task queues that have a rule set.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// `true` before any task queue was read or written.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
