//! Ports - the seams between the rules protocol and the outside world.
//!
//! - RuleStore / StoreDialer: the authoritative rule store and its connections
//! - ConfirmationPrompt: operator I/O for safe mode
//! - Clock / TokenGenerator: injectable time and token sources for stores

pub mod clock;
pub mod prompt;
pub mod rule_store;
pub mod token_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::prompt::{ConfirmationPrompt, is_affirmative};
pub use self::rule_store::{RuleStore, StoreDialer};
pub use self::token_generator::{TokenGenerator, UlidTokenGenerator};
