//! Table and JSON rendering of rule sets.

use buildrules_core::domain::{
    AssignmentRow, FormattedRules, RedirectRow, RuleRows, RuleSet, RulesError,
};
use chrono::{DateTime, Utc};

/// Pretty JSON in the `assignmentRules` / `redirectRules` shape.
pub fn rules_json(rules: &RuleSet) -> Result<String, RulesError> {
    serde_json::to_string_pretty(&FormattedRules::from(rules))
        .map_err(|e| RulesError::Output(format!("failed to encode rules as JSON: {e}")))
}

/// Both tables with their headings.
pub fn rules_tables(rules: &RuleSet, now: DateTime<Utc>) -> String {
    let formatted = FormattedRules::from(rules);
    let mut out = String::new();
    out.push_str("Assignment Rules:\n");
    out.push_str(&assignment_table(&formatted.assignment_rules, now));
    out.push('\n');
    out.push_str("Redirect Rules:\n");
    out.push_str(&redirect_table(&formatted.redirect_rules, now));
    out
}

/// One table under its "Current ..." heading, as shown before confirming.
pub fn rows_table(rows: &RuleRows, now: DateTime<Utc>) -> String {
    let table = match rows {
        RuleRows::Assignment(rows) => assignment_table(rows, now),
        RuleRows::Redirect(rows) => redirect_table(rows, now),
    };
    format!("{}\n{table}", rows.title())
}

fn assignment_table(rows: &[AssignmentRow], now: DateTime<Utc>) -> String {
    let body = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            vec![
                i.to_string(),
                row.target_build_id.clone(),
                format_percentage(row.percentage),
                relative_time(row.create_time, now),
            ]
        })
        .collect::<Vec<_>>();
    table(&["Index", "TargetBuildID", "Percentage", "CreateTime"], &body)
}

fn redirect_table(rows: &[RedirectRow], now: DateTime<Utc>) -> String {
    let body = rows
        .iter()
        .map(|row| {
            vec![
                row.source_build_id.clone(),
                row.target_build_id.clone(),
                relative_time(row.create_time, now),
            ]
        })
        .collect::<Vec<_>>();
    table(&["SourceBuildID", "TargetBuildID", "CreateTime"], &body)
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for line in std::iter::once(&header).chain(rows) {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str("  ");
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn format_percentage(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Age of `at` relative to `now`; anything under a second (or in the
/// future) is `now`.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    match secs {
        s if s < 1 => "now".to_string(),
        s if s < 60 => format!("{s} seconds ago"),
        s if s < 3_600 => format!("{} minutes ago", s / 60),
        s if s < 86_400 => format!("{} hours ago", s / 3_600),
        s => format!("{} days ago", s / 86_400),
    }
}
