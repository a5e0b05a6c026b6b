//! Rule set model: ordered assignment rules, keyed redirect rules, and the
//! conflict token that versions them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::RulesError;
use super::ids::{BuildId, TaskQueueName};

/// Percentage of the remaining traffic that a rule claims, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RampPercentage(f32);

impl RampPercentage {
    /// A ramp of 100% is the same as no ramp.
    pub const FULL: f32 = 100.0;

    /// Validate a percentage in `0..=100`.
    ///
    /// # Errors
    /// `InvalidArgument` when the value is out of range or not finite.
    pub fn new(percentage: f32) -> Result<Self, RulesError> {
        if !percentage.is_finite() || !(0.0..=Self::FULL).contains(&percentage) {
            return Err(RulesError::InvalidArgument(format!(
                "ramp percentage must be between 0 and 100, got {percentage}"
            )));
        }
        Ok(Self(percentage))
    }

    /// `None` for 100%, which is the same as having no ramp at all.
    pub fn from_percentage(percentage: f32) -> Result<Option<Self>, RulesError> {
        let ramp = Self::new(percentage)?;
        Ok((ramp.0 < Self::FULL).then_some(ramp))
    }

    /// Percentage in `0..=100`.
    pub fn value(self) -> f32 {
        self.0
    }

    /// Fraction in `0..=1`.
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(Self::FULL)
    }
}

/// Routes new tasks to `target_build_id`, optionally for a fraction of traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub target_build_id: BuildId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp: Option<RampPercentage>,

    pub create_time: DateTime<Utc>,
}

impl AssignmentRule {
    /// Percentage shown to operators; rules without a ramp claim 100.
    pub fn percentage(&self) -> f32 {
        self.ramp.map_or(RampPercentage::FULL, RampPercentage::value)
    }

    /// Claims every task that reaches it.
    pub fn is_unconditional(&self) -> bool {
        self.percentage() >= RampPercentage::FULL
    }
}

/// Sends tasks tagged with `source_build_id` to `target_build_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub source_build_id: BuildId,
    pub target_build_id: BuildId,
    pub create_time: DateTime<Utc>,
}

/// Opaque version stamp of a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictToken(Vec<u8>);

impl ConflictToken {
    /// Wrap bytes minted by a store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ConflictToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// All routing rules of one task queue as of `conflict_token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub task_queue: TaskQueueName,

    #[serde(default)]
    pub assignment_rules: Vec<AssignmentRule>,

    #[serde(default)]
    pub redirect_rules: Vec<RedirectRule>,

    pub conflict_token: ConflictToken,
}

impl RuleSet {
    /// Rule set of a task queue that has no rules yet.
    pub fn empty(task_queue: TaskQueueName, conflict_token: ConflictToken) -> Self {
        Self {
            task_queue,
            assignment_rules: Vec::new(),
            redirect_rules: Vec::new(),
            conflict_token,
        }
    }

    /// The redirect rule whose source is `source`, if any. Sources are unique.
    pub fn redirect_for(&self, source: &BuildId) -> Option<&RedirectRule> {
        self.redirect_rules
            .iter()
            .find(|rule| &rule.source_build_id == source)
    }

    /// Whether `build_id` appears anywhere in the rules (assignment target or
    /// either end of a redirect).
    pub fn references(&self, build_id: &BuildId) -> bool {
        self.assignment_rules
            .iter()
            .any(|rule| &rule.target_build_id == build_id)
            || self.redirect_rules.iter().any(|rule| {
                &rule.source_build_id == build_id || &rule.target_build_id == build_id
            })
    }
}
