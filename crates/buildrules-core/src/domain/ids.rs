//! Strongly-typed names (task queues, build ids).
//!
//! `Name<T>` shares one implementation across every kind of name while the
//! zero-sized marker `T` keeps a `TaskQueueName` from being passed where a
//! `BuildId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use super::errors::RulesError;

/// Marker trait for each kind of name.
pub trait NameMarker: Send + Sync + 'static {
    /// Human-readable label used in validation errors ("task queue", "build id").
    fn label() -> &'static str;
}

/// A validated, non-empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name<T: NameMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: NameMarker> Name<T> {
    /// Validate and wrap `value`. Surrounding whitespace is trimmed.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, RulesError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RulesError::InvalidArgument(format!(
                "{} must not be empty",
                T::label()
            )));
        }
        Ok(Self {
            value: trimmed.to_string(),
            _marker: PhantomData,
        })
    }

    /// The trimmed name.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// `true` when the wrapped value is blank. Only reachable through
    /// deserialization, which skips `parse`.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl<T: NameMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: NameMarker> AsRef<str> for Name<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

// ========================================
// Markers
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskQueue {}

impl NameMarker for TaskQueue {
    fn label() -> &'static str {
        "task queue"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Build {}

impl NameMarker for Build {
    fn label() -> &'static str {
        "build id"
    }
}

/// Name of a task queue (the scope of one rule set).
pub type TaskQueueName = Name<TaskQueue>;

/// Identifier of a deployable worker build/version.
pub type BuildId = Name<Build>;
