//! Decision procedure over an ordered policy set.

use crate::error::EvalError;
use crate::policy::{CustomFields, PolicySet};
use std::collections::BTreeSet;

/// Evaluate `policies` against `fields`, strictly in the order given.
///
/// Policy names and field keys must form an exact bijection: every policy
/// reads one input, every input feeds at least one policy. Anything else
/// fails with an [`EvalError`] before a single comparison runs, so inputs
/// are never silently ignored and policies never silently skipped.
///
/// The first policy whose comparison does not hold decides the run: the
/// result is the negation of its `success_case`. If every comparison holds,
/// the decision is the `success_case` of the last policy in the sequence.
///
/// The function is pure. It mutates neither input and identical inputs
/// always produce identical outputs.
pub fn evaluate(policies: &PolicySet, fields: &CustomFields) -> Result<bool, EvalError> {
    let last = policies.last().ok_or(EvalError::NoPolicies)?;

    let mut policy_names = BTreeSet::new();
    for policy in policies {
        if !fields.contains_key(&policy.name) {
            return Err(EvalError::MissingField(policy.name.clone()));
        }
        policy_names.insert(policy.name.as_str());
    }

    for key in fields.keys() {
        if !policy_names.contains(key.as_str()) {
            return Err(EvalError::UnknownField(key.clone()));
        }
    }

    for policy in policies {
        if !policy.criteria.holds(fields[policy.name.as_str()], policy.value) {
            return Ok(!policy.success_case);
        }
    }

    Ok(last.success_case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Criteria, Policy};
    use uuid::Uuid;

    fn policy(name: &str, criteria: Criteria, value: i64, success_case: bool) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            criteria,
            value,
            success_case,
            priority: 0,
        }
    }

    fn fields(pairs: &[(&str, i64)]) -> CustomFields {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn empty_policy_set_is_an_error() {
        let result = evaluate(&PolicySet::default(), &CustomFields::new());
        assert_eq!(result, Err(EvalError::NoPolicies));
    }

    #[test]
    fn failed_comparison_returns_negated_success_case() {
        let policies =
            PolicySet::from_ordered(vec![policy("age", Criteria::GreaterThan, 17, false)]);

        // 16 > 17 does not hold, so the decision is !false.
        let result = evaluate(&policies, &fields(&[("age", 16)]));
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn all_comparisons_true_returns_last_success_case() {
        let policies = PolicySet::from_ordered(vec![
            policy("age", Criteria::GreaterThan, 17, false),
            policy("rank", Criteria::GreaterThan, 15, false),
        ]);

        let result = evaluate(&policies, &fields(&[("age", 18), ("rank", 16)]));
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn fallthrough_ignores_earlier_success_cases() {
        for first_success_case in [false, true] {
            let policies = PolicySet::from_ordered(vec![
                policy("age", Criteria::GreaterThan, 17, first_success_case),
                policy("rank", Criteria::GreaterThan, 15, false),
                policy("income", Criteria::Equal, 1000, true),
            ]);

            let input = fields(&[("age", 18), ("rank", 16), ("income", 1000)]);
            assert_eq!(evaluate(&policies, &input), Ok(true));
        }
    }

    #[test]
    fn short_circuit_ignores_later_policies() {
        for later_success_case in [false, true] {
            let policies = PolicySet::from_ordered(vec![
                policy("age", Criteria::GreaterThan, 17, true),
                policy("rank", Criteria::GreaterThan, 15, later_success_case),
            ]);

            // The first comparison fails regardless of what follows.
            let input = fields(&[("age", 10), ("rank", 0)]);
            assert_eq!(evaluate(&policies, &input), Ok(false));
        }
    }

    #[test]
    fn evaluation_order_is_the_given_order() {
        let deny_first = policy("a", Criteria::GreaterThan, 100, false);
        let allow_first = policy("b", Criteria::LessThan, 10, true);
        let input = fields(&[("a", 50), ("b", 50)]);

        // Both comparisons fail; whichever policy runs first decides.
        let forward =
            PolicySet::from_ordered(vec![deny_first.clone(), allow_first.clone()]);
        let reversed = PolicySet::from_ordered(vec![allow_first, deny_first]);

        assert_eq!(evaluate(&forward, &input), Ok(true));
        assert_eq!(evaluate(&reversed, &input), Ok(false));
    }

    #[test]
    fn missing_field_reports_first_offending_policy() {
        let policies = PolicySet::from_ordered(vec![
            policy("age", Criteria::GreaterThan, 17, false),
            policy("size", Criteria::Equal, 1, true),
            policy("rank", Criteria::GreaterThan, 15, false),
        ]);

        let result = evaluate(&policies, &fields(&[("age", 1)]));
        assert_eq!(result, Err(EvalError::MissingField("size".to_string())));
    }

    #[test]
    fn missing_field_is_checked_before_unknown_field() {
        let policies =
            PolicySet::from_ordered(vec![policy("size", Criteria::Equal, 1, true)]);

        let result = evaluate(&policies, &fields(&[("age", 1)]));
        assert_eq!(result, Err(EvalError::MissingField("size".to_string())));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let policies =
            PolicySet::from_ordered(vec![policy("age", Criteria::GreaterThan, 17, false)]);

        let result = evaluate(&policies, &fields(&[("age", 1), ("extra", 2)]));
        assert_eq!(result, Err(EvalError::UnknownField("extra".to_string())));
    }

    #[test]
    fn exact_bijection_never_fails_membership_checks() {
        let policies = PolicySet::from_ordered(vec![
            policy("age", Criteria::GreaterThan, 17, false),
            policy("rank", Criteria::LessOrEqual, 99, true),
        ]);

        let result = evaluate(&policies, &fields(&[("age", 30), ("rank", 12)]));
        assert!(result.is_ok());
    }

    #[test]
    fn duplicate_policy_names_read_the_same_field() {
        let policies = PolicySet::from_ordered(vec![
            policy("n", Criteria::GreaterThan, 10, false),
            policy("n", Criteria::LessThan, 100, true),
        ]);

        let input = fields(&[("n", 50)]);
        assert_eq!(evaluate(&policies, &input), Ok(true));

        // First occurrence short-circuits before the second is reached.
        let input = fields(&[("n", 5)]);
        assert_eq!(evaluate(&policies, &input), Ok(true));
    }

    #[test]
    fn repeated_calls_with_identical_inputs_agree() {
        let policies = PolicySet::from_ordered(vec![
            policy("age", Criteria::GreaterOrEqual, 18, true),
            policy("rank", Criteria::Equal, 7, true),
        ]);
        let input = fields(&[("age", 21), ("rank", 7)]);

        let first = evaluate(&policies, &input);
        let second = evaluate(&policies, &input);
        assert_eq!(first, second);
        assert_eq!(input, fields(&[("age", 21), ("rank", 7)]));
    }
}
