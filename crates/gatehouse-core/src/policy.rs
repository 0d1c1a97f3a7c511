use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Relational operator a policy applies between an input field and its
/// threshold.
///
/// The set is closed: anything outside these five tokens fails to parse or
/// deserialize, so an unrecognized operator can never reach the evaluation
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criteria {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Criteria {
    /// Whether `field` satisfies this operator against `threshold`.
    pub fn holds(self, field: i64, threshold: i64) -> bool {
        match self {
            Self::GreaterThan => field > threshold,
            Self::LessThan => field < threshold,
            Self::GreaterOrEqual => field >= threshold,
            Self::LessOrEqual => field <= threshold,
            Self::Equal => field == threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criteria {
    type Err = InvalidCriteria;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            ">=" => Ok(Self::GreaterOrEqual),
            "<=" => Ok(Self::LessOrEqual),
            "==" => Ok(Self::Equal),
            other => Err(InvalidCriteria(other.to_string())),
        }
    }
}

/// Rejected operator token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid criteria '{0}'; expected one of: >, <, >=, <=, ==")]
pub struct InvalidCriteria(pub String);

/// A single business rule: compare the input field named `name` against
/// `value` using `criteria`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Opaque unique identifier; carries no meaning for evaluation.
    pub id: Uuid,
    /// Key the evaluation-time input must supply.
    pub name: String,
    pub criteria: Criteria,
    /// Integer threshold compared against the input field.
    pub value: i64,
    /// Decision returned when this policy is the terminal one of a run.
    pub success_case: bool,
    /// Lower numbers evaluate first. Ordering is owned by the store; the
    /// engine only ever sees an already-ordered [`PolicySet`].
    pub priority: i32,
}

/// Policies already sorted by ascending priority.
///
/// Only the store (or test setup) builds one, from a sequence it has put in
/// evaluation order. The engine trusts that order: it never re-sorts and
/// never deduplicates by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicySet(Vec<Policy>);

impl PolicySet {
    /// Wrap a sequence that is already sorted by ascending priority.
    pub fn from_ordered(policies: Vec<Policy>) -> Self {
        debug_assert!(policies.windows(2).all(|w| w[0].priority <= w[1].priority));
        Self(policies)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<&Policy> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Policy> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Policy] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a Policy;
    type IntoIter = std::slice::Iter<'a, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Evaluation-time input: named integer values, keys unique, order
/// irrelevant. Built fresh per request and discarded after the decision.
pub type CustomFields = BTreeMap<String, i64>;
