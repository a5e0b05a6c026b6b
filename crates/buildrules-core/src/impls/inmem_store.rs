//! InMemoryRuleStore - process-local rule store.
//!
//! One `tokio::sync::Mutex` guards the whole table, so the token check and the
//! write of an update are a single critical section.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::rule_table::RuleTable;
use crate::domain::{ConflictToken, RuleLimits, RuleOperation, RuleSet, RulesError, TaskQueueName};
use crate::ports::{Clock, RuleStore, StoreDialer, SystemClock, TokenGenerator, UlidTokenGenerator};

struct Inner {
    table: Mutex<RuleTable>,
    clock: Arc<dyn Clock>,
    tokens: Box<dyn TokenGenerator>,
    limits: RuleLimits,
    available: AtomicBool,
    open_connections: AtomicUsize,
    rpc_count: AtomicUsize,
}

/// InMemoryRuleStore keeps every rule set in process memory.
///
/// # Implementation
/// - [`RuleTable`] behind one `tokio::sync::Mutex`
/// - counters for open connections and RPCs, read by tests
/// - an availability switch to simulate outages
///
/// # Thread Safety
/// Cloning shares the same underlying table; clones may be used from any
/// number of tasks.
#[derive(Clone)]
pub struct InMemoryRuleStore {
    inner: Arc<Inner>,
}

impl InMemoryRuleStore {
    /// Empty store on the wall clock with default limits.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), RuleLimits::default())
    }

    /// Empty store with an explicit clock and rule limits.
    pub fn with_clock(clock: Arc<dyn Clock>, limits: RuleLimits) -> Self {
        let tokens = Box::new(UlidTokenGenerator::new(Arc::clone(&clock)));
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(RuleTable::new()),
                clock,
                tokens,
                limits,
                available: AtomicBool::new(true),
                open_connections: AtomicUsize::new(0),
                rpc_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate the store going away (or coming back). While unavailable every
    /// dial and RPC fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Connections handed out by `dial` and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.inner.open_connections.load(Ordering::SeqCst)
    }

    /// Number of `get_rules` + `update_rules` calls received.
    pub fn rpc_count(&self) -> usize {
        self.inner.rpc_count.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), RulesError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RulesError::StoreUnavailable(
                "in-memory store is offline".to_string(),
            ))
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get_rules(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError> {
        self.inner.rpc_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut table = self.inner.table.lock().await;
        let (rules, _) = table.get_or_create(task_queue, self.inner.tokens.as_ref());
        Ok(rules)
    }

    async fn update_rules(
        &self,
        task_queue: &TaskQueueName,
        conflict_token: &ConflictToken,
        operation: &RuleOperation,
    ) -> Result<RuleSet, RulesError> {
        self.inner.rpc_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut table = self.inner.table.lock().await;
        let updated = table.update(
            task_queue,
            conflict_token,
            operation,
            self.inner.clock.now(),
            &self.inner.limits,
            self.inner.tokens.as_ref(),
        )?;
        info!(
            task_queue = %task_queue,
            operation = operation.name(),
            assignment_rules = updated.assignment_rules.len(),
            redirect_rules = updated.redirect_rules.len(),
            "rules updated"
        );
        Ok(updated)
    }
}

/// A dialed connection. Dropping it releases it.
struct InMemoryConnection {
    store: InMemoryRuleStore,
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        self.store
            .inner
            .open_connections
            .fetch_sub(1, Ordering::SeqCst);
        debug!("in-memory store connection released");
    }
}

#[async_trait]
impl RuleStore for InMemoryConnection {
    async fn get_rules(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError> {
        self.store.get_rules(task_queue).await
    }

    async fn update_rules(
        &self,
        task_queue: &TaskQueueName,
        conflict_token: &ConflictToken,
        operation: &RuleOperation,
    ) -> Result<RuleSet, RulesError> {
        self.store
            .update_rules(task_queue, conflict_token, operation)
            .await
    }
}

#[async_trait]
impl StoreDialer for InMemoryRuleStore {
    async fn dial(&self) -> Result<Box<dyn RuleStore>, RulesError> {
        self.check_available()?;
        self.inner.open_connections.fetch_add(1, Ordering::SeqCst);
        debug!("in-memory store connection opened");
        Ok(Box::new(InMemoryConnection {
            store: self.clone(),
        }))
    }
}
