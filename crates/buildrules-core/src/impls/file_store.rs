//! FileRuleStore - single-host rule store persisted as one JSON document.
//!
//! Every RPC loads the document, works on it and (for writes) saves it back,
//! all while holding both an in-process mutex and an exclusive lock file next
//! to the document. The lock file is what keeps two CLI processes from both
//! accepting the same conflict token.
//!
//! Saves go through a temporary file and a rename, so readers never observe a
//! half-written document.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::rule_table::RuleTable;
use crate::domain::{ConflictToken, RuleLimits, RuleOperation, RuleSet, RulesError, TaskQueueName};
use crate::ports::{Clock, RuleStore, StoreDialer, SystemClock, TokenGenerator, UlidTokenGenerator};

/// How long to wait for another process holding the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    #[serde(default = "default_lock_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_lock_attempts() -> u32 {
    50
}

fn default_retry_delay_ms() -> u64 {
    20
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            attempts: default_lock_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

struct Inner {
    path: PathBuf,
    guard: Mutex<()>,
    clock: Arc<dyn Clock>,
    tokens: Box<dyn TokenGenerator>,
    limits: RuleLimits,
    lock: LockSettings,
}

/// FileRuleStore persists every task queue's rules in one JSON document.
///
/// # Thread Safety
/// Clones share the in-process mutex. Separate processes (or separately
/// constructed stores) are serialized by the lock file.
///
/// # Example
/// ```ignore
/// let store = FileRuleStore::new("rules.json", RuleLimits::default(), LockSettings::default());
/// let client = RulesClient::new(store);
/// ```
#[derive(Clone)]
pub struct FileRuleStore {
    inner: Arc<Inner>,
}

impl FileRuleStore {
    /// Store backed by the JSON document at `path`, stamped by the wall clock.
    /// Nothing is read or created until the first RPC.
    pub fn new(path: impl Into<PathBuf>, limits: RuleLimits, lock: LockSettings) -> Self {
        Self::with_clock(path, limits, lock, Arc::new(SystemClock))
    }

    /// Like [`FileRuleStore::new`] with an explicit clock for `create_time`
    /// and token timestamps.
    pub fn with_clock(
        path: impl Into<PathBuf>,
        limits: RuleLimits,
        lock: LockSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Box::new(UlidTokenGenerator::new(Arc::clone(&clock)));
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                guard: Mutex::new(()),
                clock,
                tokens,
                limits,
                lock,
            }),
        }
    }

    /// Location of the JSON document.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn lock_path(&self) -> PathBuf {
        with_suffix(&self.inner.path, "lock")
    }

    async fn acquire_lock_file(&self) -> Result<LockFile, RulesError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, "create directory", &e))?;
        }

        let attempts = self.inner.lock.attempts.max(1);
        for attempt in 1..=attempts {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => return Ok(LockFile { path: lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(attempt, path = %lock_path.display(), "state file is locked, waiting");
                    tokio::time::sleep(Duration::from_millis(self.inner.lock.retry_delay_ms))
                        .await;
                }
                Err(e) => return Err(unavailable(&lock_path, "create lock file", &e)),
            }
        }
        Err(RulesError::StoreUnavailable(format!(
            "state file {} is locked by another process (remove {} if no other process is running)",
            self.inner.path.display(),
            lock_path.display()
        )))
    }

    async fn load(&self) -> Result<RuleTable, RulesError> {
        let path = &self.inner.path;
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet, starting empty");
                return Ok(RuleTable::new());
            }
            Err(e) => return Err(unavailable(path, "read", &e)),
        };
        serde_json::from_str(&content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "state file is corrupt");
            RulesError::StoreUnavailable(format!(
                "state file {} is not valid: {e}",
                path.display()
            ))
        })
    }

    async fn save(&self, table: &RuleTable) -> Result<(), RulesError> {
        let path = &self.inner.path;
        let json = serde_json::to_vec_pretty(table).map_err(|e| {
            RulesError::StoreUnavailable(format!("failed to encode rules: {e}"))
        })?;
        let tmp = with_suffix(path, "tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| unavailable(&tmp, "write", &e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| unavailable(path, "replace", &e))?;
        Ok(())
    }
}

/// Removes the lock file when dropped, on every exit path.
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn unavailable(path: &Path, action: &str, e: &std::io::Error) -> RulesError {
    RulesError::StoreUnavailable(format!("failed to {action} {}: {e}", path.display()))
}

#[async_trait]
impl RuleStore for FileRuleStore {
    async fn get_rules(&self, task_queue: &TaskQueueName) -> Result<RuleSet, RulesError> {
        let _guard = self.inner.guard.lock().await;
        let _lock = self.acquire_lock_file().await?;

        let mut table = self.load().await?;
        let (rules, created) = table.get_or_create(task_queue, self.inner.tokens.as_ref());
        if created {
            self.save(&table).await?;
        }
        Ok(rules)
    }

    async fn update_rules(
        &self,
        task_queue: &TaskQueueName,
        conflict_token: &ConflictToken,
        operation: &RuleOperation,
    ) -> Result<RuleSet, RulesError> {
        let _guard = self.inner.guard.lock().await;
        let _lock = self.acquire_lock_file().await?;

        let mut table = self.load().await?;
        let updated = table.update(
            task_queue,
            conflict_token,
            operation,
            self.inner.clock.now(),
            &self.inner.limits,
            self.inner.tokens.as_ref(),
        )?;
        self.save(&table).await?;
        info!(
            task_queue = %task_queue,
            operation = operation.name(),
            path = %self.inner.path.display(),
            "rules updated"
        );
        Ok(updated)
    }
}

#[async_trait]
impl StoreDialer for FileRuleStore {
    async fn dial(&self) -> Result<Box<dyn RuleStore>, RulesError> {
        debug!(path = %self.inner.path.display(), "opening file store");
        Ok(Box::new(self.clone()))
    }
}
