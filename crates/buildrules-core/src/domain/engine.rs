//! Mutation engine: applies one [`RuleOperation`] to a [`RuleSet`].
//!
//! The engine is a pure function. It never touches the conflict token; the
//! store checks the presented token before calling it and stamps a fresh one
//! on the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coverage::{catch_all_count, effective_shares, has_later_fallback, is_catch_all};
use super::errors::RulesError;
use super::ids::BuildId;
use super::operation::RuleOperation;
use super::rules::{AssignmentRule, RedirectRule, RuleSet};

/// Store-side caps on the number of rules per task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLimits {
    #[serde(default = "default_max_assignment_rules")]
    pub max_assignment_rules: usize,

    #[serde(default = "default_max_redirect_rules")]
    pub max_redirect_rules: usize,
}

fn default_max_assignment_rules() -> usize {
    100
}

fn default_max_redirect_rules() -> usize {
    500
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self {
            max_assignment_rules: default_max_assignment_rules(),
            max_redirect_rules: default_max_redirect_rules(),
        }
    }
}

/// Apply `op` to `current`, returning the new rules. `current` is left
/// untouched when an error is returned.
pub fn apply(
    current: &RuleSet,
    op: &RuleOperation,
    now: DateTime<Utc>,
    limits: &RuleLimits,
) -> Result<RuleSet, RulesError> {
    op.validate()?;
    let mut next = current.clone();

    match op {
        RuleOperation::InsertAssignment {
            rule_index,
            target_build_id,
            ramp,
        } => {
            if next.assignment_rules.len() >= limits.max_assignment_rules {
                return Err(RulesError::RuleLimitExceeded {
                    what: "assignment rules",
                    limit: limits.max_assignment_rules,
                });
            }
            let index = (*rule_index as usize).min(next.assignment_rules.len());
            next.assignment_rules.insert(
                index,
                AssignmentRule {
                    target_build_id: target_build_id.clone(),
                    ramp: *ramp,
                    create_time: now,
                },
            );
        }

        RuleOperation::ReplaceAssignment {
            rule_index,
            target_build_id,
            ramp,
            force,
        } => {
            let index = existing_index(&next, *rule_index)?;
            let replacement = AssignmentRule {
                target_build_id: target_build_id.clone(),
                ramp: *ramp,
                create_time: now,
            };
            let old = &next.assignment_rules[index];
            if !force
                && old.is_unconditional()
                && !replacement.is_unconditional()
                && is_catch_all(&next.assignment_rules, index)
                && catch_all_count(&next.assignment_rules) == 1
            {
                return Err(RulesError::ForceRequired {
                    reason: format!(
                        "rule {index} is the only rule taking all remaining tasks and the replacement is ramped"
                    ),
                });
            }
            next.assignment_rules[index] = replacement;
        }

        RuleOperation::DeleteAssignment { rule_index, force } => {
            let index = existing_index(&next, *rule_index)?;
            let share = effective_shares(&next.assignment_rules)[index];
            if !force && share > 0.0 && !has_later_fallback(&next.assignment_rules, index) {
                return Err(RulesError::ForceRequired {
                    reason: format!(
                        "rule {index} receives {:.1}% of new tasks and no later rule takes them over",
                        share * 100.0
                    ),
                });
            }
            next.assignment_rules.remove(index);
        }

        RuleOperation::AddRedirect {
            source_build_id,
            target_build_id,
        } => {
            if next.redirect_for(source_build_id).is_some() {
                return Err(RulesError::DuplicateSource {
                    source_build_id: source_build_id.to_string(),
                });
            }
            if next.redirect_rules.len() >= limits.max_redirect_rules {
                return Err(RulesError::RuleLimitExceeded {
                    what: "redirect rules",
                    limit: limits.max_redirect_rules,
                });
            }
            next.redirect_rules.push(RedirectRule {
                source_build_id: source_build_id.clone(),
                target_build_id: target_build_id.clone(),
                create_time: now,
            });
        }

        RuleOperation::ReplaceRedirect {
            source_build_id,
            target_build_id,
        } => {
            let position = redirect_position(&next, source_build_id)?;
            next.redirect_rules[position] = RedirectRule {
                source_build_id: source_build_id.clone(),
                target_build_id: target_build_id.clone(),
                create_time: now,
            };
        }

        RuleOperation::DeleteRedirect { source_build_id } => {
            let position = redirect_position(&next, source_build_id)?;
            next.redirect_rules.remove(position);
        }

        RuleOperation::CommitBuildId {
            target_build_id,
            force,
        } => {
            if !force && !current.references(target_build_id) {
                return Err(RulesError::ForceRequired {
                    reason: format!(
                        "build id {target_build_id} is not referenced by any rule; committing it would move all default traffic to an unknown build"
                    ),
                });
            }
            let displaced: Vec<&str> = current
                .assignment_rules
                .iter()
                .enumerate()
                .filter(|(index, rule)| {
                    &rule.target_build_id != target_build_id
                        && is_catch_all(&current.assignment_rules, *index)
                })
                .map(|(_, rule)| rule.target_build_id.as_str())
                .collect();
            if !force && !displaced.is_empty() {
                return Err(RulesError::ForceRequired {
                    reason: format!(
                        "committing {target_build_id} takes full coverage away from {}",
                        displaced.join(", ")
                    ),
                });
            }
            next.assignment_rules.retain(|rule| {
                &rule.target_build_id != target_build_id && !rule.is_unconditional()
            });
            next.assignment_rules.push(AssignmentRule {
                target_build_id: target_build_id.clone(),
                ramp: None,
                create_time: now,
            });
        }
    }

    Ok(next)
}

fn existing_index(rules: &RuleSet, rule_index: u32) -> Result<usize, RulesError> {
    let index = rule_index as usize;
    if index >= rules.assignment_rules.len() {
        return Err(RulesError::IndexOutOfRange {
            index: rule_index,
            len: rules.assignment_rules.len(),
        });
    }
    Ok(index)
}

fn redirect_position(rules: &RuleSet, source: &BuildId) -> Result<usize, RulesError> {
    rules
        .redirect_rules
        .iter()
        .position(|rule| &rule.source_build_id == source)
        .ok_or_else(|| RulesError::NotFound {
            source_build_id: source.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildId, ConflictToken, RampPercentage, TaskQueueName};
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn id(s: &str) -> BuildId {
        BuildId::parse(s).unwrap()
    }

    fn ramp(p: f32) -> Option<RampPercentage> {
        RampPercentage::from_percentage(p).unwrap()
    }

    fn empty() -> RuleSet {
        RuleSet::empty(
            TaskQueueName::parse("q").unwrap(),
            ConflictToken::from_bytes(vec![1]),
        )
    }

    fn with_assignments(spec: &[(&str, f32)]) -> RuleSet {
        let mut rules = empty();
        for (build, percentage) in spec {
            rules.assignment_rules.push(AssignmentRule {
                target_build_id: id(build),
                ramp: ramp(*percentage),
                create_time: now(),
            });
        }
        rules
    }

    fn with_redirects(pairs: &[(&str, &str)]) -> RuleSet {
        let mut rules = empty();
        for (source, target) in pairs {
            rules.redirect_rules.push(RedirectRule {
                source_build_id: id(source),
                target_build_id: id(target),
                create_time: now(),
            });
        }
        rules
    }

    fn assignments(rules: &RuleSet) -> Vec<(String, f32)> {
        rules
            .assignment_rules
            .iter()
            .map(|r| (r.target_build_id.to_string(), r.percentage()))
            .collect()
    }

    fn insert(index: u32, build: &str, percentage: f32) -> RuleOperation {
        RuleOperation::InsertAssignment {
            rule_index: index,
            target_build_id: id(build),
            ramp: ramp(percentage),
        }
    }

    fn apply_default(rules: &RuleSet, op: RuleOperation) -> Result<RuleSet, RulesError> {
        apply(rules, &op, now(), &RuleLimits::default())
    }

    #[test]
    fn insert_shifts_later_rules_down() {
        let rules = with_assignments(&[("a", 100.0), ("b", 100.0)]);
        let next = apply_default(&rules, insert(1, "c", 30.0)).unwrap();
        assert_eq!(
            assignments(&next),
            vec![("a".into(), 100.0), ("c".into(), 30.0), ("b".into(), 100.0)]
        );
        assert_eq!(next.assignment_rules.len(), rules.assignment_rules.len() + 1);
        assert_eq!(next.assignment_rules[1].create_time, now());
    }

    #[rstest]
    #[case::just_past_end(2)]
    #[case::far_past_end(100)]
    #[case::max(u32::MAX)]
    fn insert_past_the_end_appends(#[case] index: u32) {
        let rules = with_assignments(&[("a", 100.0), ("b", 100.0)]);
        let next = apply_default(&rules, insert(index, "c", 10.0)).unwrap();
        assert_eq!(next.assignment_rules.last().unwrap().target_build_id, id("c"));
    }

    #[test]
    fn insert_respects_the_assignment_limit() {
        let rules = with_assignments(&[("a", 100.0)]);
        let limits = RuleLimits {
            max_assignment_rules: 1,
            ..RuleLimits::default()
        };
        let err = apply(&rules, &insert(0, "b", 100.0), now(), &limits).unwrap_err();
        assert!(matches!(err, RulesError::RuleLimitExceeded { limit: 1, .. }));
    }

    #[test]
    fn replace_requires_an_existing_index() {
        let rules = with_assignments(&[("a", 100.0)]);
        let err = apply_default(
            &rules,
            RuleOperation::ReplaceAssignment {
                rule_index: 1,
                target_build_id: id("b"),
                ramp: None,
                force: false,
            },
        )
        .unwrap_err();
        assert_eq!(err, RulesError::IndexOutOfRange { index: 1, len: 1 });
    }

    #[test]
    fn replace_changes_ramp_in_place() {
        let rules = with_assignments(&[("id2", 10.0), ("id1", 100.0)]);
        let next = apply_default(
            &rules,
            RuleOperation::ReplaceAssignment {
                rule_index: 0,
                target_build_id: id("id2"),
                ramp: ramp(40.0),
                force: false,
            },
        )
        .unwrap();
        assert_eq!(
            assignments(&next),
            vec![("id2".into(), 40.0), ("id1".into(), 100.0)]
        );
    }

    #[rstest]
    #[case::without_force(false, true)]
    #[case::with_force(true, false)]
    fn ramping_the_only_unconditional_rule_needs_force(
        #[case] force: bool,
        #[case] rejected: bool,
    ) {
        let rules = with_assignments(&[("a", 100.0)]);
        let result = apply_default(
            &rules,
            RuleOperation::ReplaceAssignment {
                rule_index: 0,
                target_build_id: id("b"),
                ramp: ramp(50.0),
                force,
            },
        );
        assert_eq!(
            matches!(result, Err(RulesError::ForceRequired { .. })),
            rejected
        );
    }

    #[test]
    fn ramping_one_of_two_unconditional_rules_is_allowed() {
        let rules = with_assignments(&[("a", 100.0), ("b", 100.0)]);
        let next = apply_default(
            &rules,
            RuleOperation::ReplaceAssignment {
                rule_index: 0,
                target_build_id: id("a"),
                ramp: ramp(50.0),
                force: false,
            },
        )
        .unwrap();
        assert_eq!(next.assignment_rules[0].percentage(), 50.0);
    }

    #[rstest]
    #[case::before_an_unconditional_rule(&[("a", 100.0), ("b", 30.0)])]
    #[case::before_a_ramped_final_rule(&[("a", 100.0), ("b", 30.0), ("c", 20.0)])]
    fn ramping_a_rule_ahead_of_a_final_rule_is_allowed(#[case] spec: &[(&str, f32)]) {
        let rules = with_assignments(spec);
        let next = apply_default(
            &rules,
            RuleOperation::ReplaceAssignment {
                rule_index: 0,
                target_build_id: id("a"),
                ramp: ramp(30.0),
                force: false,
            },
        )
        .unwrap();
        assert_eq!(next.assignment_rules[0].percentage(), 30.0);
    }

    #[test]
    fn delete_requires_an_existing_index() {
        let err = apply_default(
            &empty(),
            RuleOperation::DeleteAssignment {
                rule_index: 0,
                force: true,
            },
        )
        .unwrap_err();
        assert_eq!(err, RulesError::IndexOutOfRange { index: 0, len: 0 });
    }

    #[test]
    fn delete_of_a_rule_without_traffic_is_allowed() {
        let rules = with_assignments(&[("id2", 40.0), ("id1", 100.0), ("id3", 10.0)]);
        let next = apply_default(
            &rules,
            RuleOperation::DeleteAssignment {
                rule_index: 2,
                force: false,
            },
        )
        .unwrap();
        assert_eq!(
            assignments(&next),
            vec![("id2".into(), 40.0), ("id1".into(), 100.0)]
        );
    }

    #[test]
    fn delete_of_a_ramped_rule_with_later_fallback_is_allowed() {
        let rules = with_assignments(&[("id2", 40.0), ("id1", 100.0)]);
        let next = apply_default(
            &rules,
            RuleOperation::DeleteAssignment {
                rule_index: 0,
                force: false,
            },
        )
        .unwrap();
        assert_eq!(assignments(&next), vec![("id1".into(), 100.0)]);
    }

    #[rstest]
    #[case::ramped_final_rule_takes_over(&[("a", 40.0), ("b", 30.0)], 0)]
    #[case::middle_of_three(&[("a", 20.0), ("b", 50.0), ("c", 10.0)], 1)]
    fn delete_with_a_final_rule_behind_it_is_allowed(
        #[case] spec: &[(&str, f32)],
        #[case] index: u32,
    ) {
        let rules = with_assignments(spec);
        let next = apply_default(
            &rules,
            RuleOperation::DeleteAssignment {
                rule_index: index,
                force: false,
            },
        )
        .unwrap();
        assert_eq!(next.assignment_rules.len(), spec.len() - 1);
    }

    #[rstest]
    #[case::only_rule(&[("a", 100.0)], 0)]
    #[case::last_fallback(&[("id2", 40.0), ("id1", 100.0)], 1)]
    #[case::ramped_last(&[("a", 50.0), ("b", 30.0)], 1)]
    fn delete_of_live_traffic_without_fallback_needs_force(
        #[case] spec: &[(&str, f32)],
        #[case] index: u32,
    ) {
        let rules = with_assignments(spec);
        let err = apply_default(
            &rules,
            RuleOperation::DeleteAssignment {
                rule_index: index,
                force: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RulesError::ForceRequired { .. }));

        let next = apply_default(
            &rules,
            RuleOperation::DeleteAssignment {
                rule_index: index,
                force: true,
            },
        )
        .unwrap();
        assert_eq!(next.assignment_rules.len(), spec.len() - 1);
    }

    #[test]
    fn add_redirect_rejects_duplicate_source_and_leaves_set_unchanged() {
        let rules = with_redirects(&[("id1", "id3")]);
        let err = apply_default(
            &rules,
            RuleOperation::AddRedirect {
                source_build_id: id("id1"),
                target_build_id: id("id4"),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            RulesError::DuplicateSource {
                source_build_id: "id1".into()
            }
        );
        assert_eq!(rules.redirect_rules.len(), 1);
        assert_eq!(rules.redirect_rules[0].target_build_id, id("id3"));
    }

    #[test]
    fn redirect_chains_are_permitted() {
        let rules = with_redirects(&[("id1", "id3")]);
        let next = apply_default(
            &rules,
            RuleOperation::AddRedirect {
                source_build_id: id("id3"),
                target_build_id: id("id4"),
            },
        )
        .unwrap();
        assert_eq!(next.redirect_rules.len(), 2);
    }

    #[test]
    fn replace_redirect_keeps_position() {
        let rules = with_redirects(&[("a", "b"), ("c", "d")]);
        let next = apply_default(
            &rules,
            RuleOperation::ReplaceRedirect {
                source_build_id: id("a"),
                target_build_id: id("z"),
            },
        )
        .unwrap();
        assert_eq!(next.redirect_rules[0].target_build_id, id("z"));
        assert_eq!(next.redirect_rules[1].source_build_id, id("c"));
    }

    #[rstest]
    #[case::replace(RuleOperation::ReplaceRedirect { source_build_id: id("x"), target_build_id: id("y") })]
    #[case::delete(RuleOperation::DeleteRedirect { source_build_id: id("x") })]
    fn missing_redirect_source_is_not_found(#[case] op: RuleOperation) {
        let rules = with_redirects(&[("a", "b")]);
        assert_eq!(
            apply_default(&rules, op).unwrap_err(),
            RulesError::NotFound {
                source_build_id: "x".into()
            }
        );
    }

    #[test]
    fn commit_keeps_partial_ramps_of_other_builds() {
        let rules = with_assignments(&[("id4", 5.0), ("id2", 40.0), ("id1", 100.0), ("id2", 100.0)]);
        let next = apply_default(
            &rules,
            RuleOperation::CommitBuildId {
                target_build_id: id("id2"),
                force: true,
            },
        )
        .unwrap();
        assert_eq!(
            assignments(&next),
            vec![("id4".into(), 5.0), ("id2".into(), 100.0)]
        );
    }

    #[test]
    fn commit_without_force_rejects_dropping_other_full_rules() {
        let rules = with_assignments(&[("id2", 40.0), ("id1", 100.0)]);
        let err = apply_default(
            &rules,
            RuleOperation::CommitBuildId {
                target_build_id: id("id2"),
                force: false,
            },
        )
        .unwrap_err();
        match err {
            RulesError::ForceRequired { reason } => assert!(reason.contains("id1")),
            other => panic!("expected ForceRequired, got {other:?}"),
        }
    }

    #[rstest]
    #[case::already_last(&[("id1", 30.0), ("id2", 100.0)])]
    #[case::only_rule(&[("id2", 40.0)])]
    fn commit_without_force_is_allowed_when_no_other_build_loses_coverage(
        #[case] spec: &[(&str, f32)],
    ) {
        let next = apply_default(
            &with_assignments(spec),
            RuleOperation::CommitBuildId {
                target_build_id: id("id2"),
                force: false,
            },
        )
        .unwrap();
        assert_eq!(next.assignment_rules.last().unwrap().target_build_id, id("id2"));
        assert!(next.assignment_rules.last().unwrap().is_unconditional());
    }

    #[test]
    fn commit_without_force_rejects_displacing_a_ramped_final_rule() {
        let rules = with_assignments(&[("id2", 40.0), ("id1", 30.0)]);
        let result = apply_default(
            &rules,
            RuleOperation::CommitBuildId {
                target_build_id: id("id2"),
                force: false,
            },
        );
        assert!(matches!(result, Err(RulesError::ForceRequired { .. })));
    }

    #[test]
    fn commit_of_unknown_build_needs_force() {
        let rules = with_assignments(&[("id1", 100.0)]);
        let op = |force| RuleOperation::CommitBuildId {
            target_build_id: id("id9"),
            force,
        };
        assert!(matches!(
            apply_default(&rules, op(false)),
            Err(RulesError::ForceRequired { .. })
        ));
        let next = apply_default(&rules, op(true)).unwrap();
        assert_eq!(assignments(&next), vec![("id9".into(), 100.0)]);
    }

    #[test]
    fn commit_does_not_touch_redirects() {
        let mut rules = with_assignments(&[("id2", 40.0), ("id1", 100.0)]);
        rules.redirect_rules = with_redirects(&[("id3", "id5")]).redirect_rules;
        let next = apply_default(
            &rules,
            RuleOperation::CommitBuildId {
                target_build_id: id("id2"),
                force: true,
            },
        )
        .unwrap();
        assert_eq!(assignments(&next), vec![("id2".into(), 100.0)]);
        assert_eq!(next.redirect_rules, rules.redirect_rules);
    }

    #[test]
    fn engine_leaves_the_token_alone() {
        let rules = empty();
        let next = apply_default(&rules, insert(0, "a", 100.0)).unwrap();
        assert_eq!(next.conflict_token, rules.conflict_token);
    }
}
