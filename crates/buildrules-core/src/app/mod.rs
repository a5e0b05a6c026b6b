//! App - the client side of the rules protocol.
//!
//! # Components
//! - **ConflictTokenGate**: fresh read of rules + token before every mutation
//! - **SafeMode**: confirm-before-mutate state machine
//! - **RulesClient**: wires the gate, safe mode and a store connection together

pub mod client;
pub mod gate;
pub mod safe_mode;

pub use self::client::{RulesClient, UpdateOptions, UpdateOutcome};
pub use self::gate::ConflictTokenGate;
pub use self::safe_mode::{SafeMode, SafeModeState};
