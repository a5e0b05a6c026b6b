//! Impls - reference implementations of the ports.
//!
//! # Included
//! - **InMemoryRuleStore**: process-local store, used by tests and embedders
//! - **FileRuleStore**: single-host JSON store used by the CLI
//!
//! Both share [`RuleTable`], which performs the token check and runs the
//! mutation engine.

pub mod file_store;
pub mod inmem_store;
pub mod rule_table;

pub use self::file_store::{FileRuleStore, LockSettings};
pub use self::inmem_store::InMemoryRuleStore;
pub use self::rule_table::RuleTable;
