//! Render-ready projection of a rule set.
//!
//! Field names follow the JSON shape consumers already read
//! (`assignmentRules[].targetBuildID`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::RuleSubset;
use super::rules::{AssignmentRule, RedirectRule, RuleSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    #[serde(rename = "targetBuildID")]
    pub target_build_id: String,
    pub percentage: f32,
    #[serde(rename = "createTime")]
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRow {
    #[serde(rename = "sourceBuildID")]
    pub source_build_id: String,
    #[serde(rename = "targetBuildID")]
    pub target_build_id: String,
    #[serde(rename = "createTime")]
    pub create_time: DateTime<Utc>,
}

impl From<&AssignmentRule> for AssignmentRow {
    fn from(rule: &AssignmentRule) -> Self {
        Self {
            target_build_id: rule.target_build_id.to_string(),
            percentage: rule.percentage(),
            create_time: rule.create_time,
        }
    }
}

impl From<&RedirectRule> for RedirectRow {
    fn from(rule: &RedirectRule) -> Self {
        Self {
            source_build_id: rule.source_build_id.to_string(),
            target_build_id: rule.target_build_id.to_string(),
            create_time: rule.create_time,
        }
    }
}

/// Both tables of a rule set, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRules {
    pub assignment_rules: Vec<AssignmentRow>,
    pub redirect_rules: Vec<RedirectRow>,
}

impl From<&RuleSet> for FormattedRules {
    fn from(rules: &RuleSet) -> Self {
        Self {
            assignment_rules: rules.assignment_rules.iter().map(Into::into).collect(),
            redirect_rules: rules.redirect_rules.iter().map(Into::into).collect(),
        }
    }
}

/// One of the two tables; what the confirmation prompt shows.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRows {
    Assignment(Vec<AssignmentRow>),
    Redirect(Vec<RedirectRow>),
}

impl RuleRows {
    /// Rows of one table of `rules`, in rule order.
    pub fn of(rules: &RuleSet, subset: RuleSubset) -> Self {
        let formatted = FormattedRules::from(rules);
        match subset {
            RuleSubset::Assignment => RuleRows::Assignment(formatted.assignment_rules),
            RuleSubset::Redirect => RuleRows::Redirect(formatted.redirect_rules),
        }
    }

    /// Heading printed above the table in the confirmation prompt.
    pub fn title(&self) -> &'static str {
        match self {
            RuleRows::Assignment(_) => "Current Assignment Rules:",
            RuleRows::Redirect(_) => "Current Redirect Rules:",
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            RuleRows::Assignment(rows) => rows.len(),
            RuleRows::Redirect(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
