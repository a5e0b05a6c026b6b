//! Traffic coverage of an ordered assignment rule list.
//!
//! Ramps are sequential conditional probabilities: rule 0 claims its ramp of
//! all traffic, rule 1 claims its ramp of whatever rule 0 left, and so on. The
//! last rule claims whatever is left regardless of its own ramp.

use super::rules::AssignmentRule;

/// Share of all new tasks (in `[0, 1]`) that each rule ends up receiving.
pub fn effective_shares(rules: &[AssignmentRule]) -> Vec<f64> {
    let mut remaining = 1.0_f64;
    let last = rules.len().saturating_sub(1);
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            let fraction = if index == last {
                1.0
            } else {
                rule.ramp.map_or(1.0, |ramp| ramp.fraction())
            };
            let share = remaining * fraction;
            remaining -= share;
            share
        })
        .collect()
}

/// Whether the rule at `index` takes every task that reaches it: either it is
/// unconditional or it is the final rule, which absorbs the remainder.
pub fn is_catch_all(rules: &[AssignmentRule], index: usize) -> bool {
    index + 1 == rules.len() || rules[index].is_unconditional()
}

/// Number of rules that take every task reaching them.
pub fn catch_all_count(rules: &[AssignmentRule]) -> usize {
    (0..rules.len())
        .filter(|&index| is_catch_all(rules, index))
        .count()
}

/// Whether some rule after `index` takes everything that reaches it.
pub fn has_later_fallback(rules: &[AssignmentRule], index: usize) -> bool {
    (index + 1..rules.len()).any(|later| is_catch_all(rules, later))
}
