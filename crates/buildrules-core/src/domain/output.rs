//! Output mode requested by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-readable tables; prompts allowed.
    #[default]
    Table,

    /// Machine-readable JSON on stdout; prompts would corrupt it.
    Json,
}

impl OutputMode {
    /// `true` when stdout is reserved for machine-readable output.
    pub fn is_structured(self) -> bool {
        matches!(self, OutputMode::Json)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Table => f.write_str("table"),
            OutputMode::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "text" => Ok(OutputMode::Table),
            "json" => Ok(OutputMode::Json),
            other => Err(format!("unknown output mode '{other}' (expected table or json)")),
        }
    }
}
