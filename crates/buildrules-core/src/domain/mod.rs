//! Domain model (names, rules, operations, errors) and the pure mutation engine.

pub mod coverage;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod operation;
pub mod output;
pub mod rows;
pub mod rules;

pub use self::engine::{RuleLimits, apply};
pub use self::errors::{ErrorKind, RulesError};
pub use self::ids::{BuildId, TaskQueueName};
pub use self::operation::{RuleOperation, RuleSubset};
pub use self::output::OutputMode;
pub use self::rows::{AssignmentRow, FormattedRules, RedirectRow, RuleRows};
pub use self::rules::{AssignmentRule, ConflictToken, RampPercentage, RedirectRule, RuleSet};
