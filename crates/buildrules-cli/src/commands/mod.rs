pub mod get;
pub mod update;

use buildrules_core::domain::{OutputMode, RuleSet, RulesError};
use chrono::Utc;

use crate::render;

/// Render `rules` for `output` and write them to stdout.
pub fn print_rules(rules: &RuleSet, output: OutputMode) -> Result<(), RulesError> {
    print!("{}", format_rules(rules, output)?);
    Ok(())
}

/// JSON or tables for `rules`, newline-terminated.
pub fn format_rules(rules: &RuleSet, output: OutputMode) -> Result<String, RulesError> {
    match output {
        OutputMode::Json => render::rules_json(rules).map(|json| json + "\n"),
        OutputMode::Table => Ok(render::rules_tables(rules, Utc::now())),
    }
}
