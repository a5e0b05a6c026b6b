//! buildrules-core
//!
//! Build-id routing rules for task queues: which build new work is assigned
//! to, and which builds redirect to newer ones.
//!
//! # Modules
//! - **domain**: rule model, operations, the mutation engine, errors
//! - **ports**: seams (RuleStore, StoreDialer, ConfirmationPrompt, Clock, TokenGenerator)
//! - **impls**: in-memory and file-backed stores
//! - **app**: conflict-token gate, safe-mode confirmation, RulesClient
//! - **config**: client configuration loading

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
