//! ---
//! mvcc_section: "02-scenario-model"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Ordered scenario steps grouped by transaction tag."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use mvcc_common::Dialect;
use serde::Serialize;

use crate::error::{ParseError, Result};

/// Maximum number of concurrent transactions (and therefore sessions) a scenario may use.
pub const MAX_TRANSACTIONS: usize = 3;

/// Number of trailing step-key characters that name the transaction.
const TAG_LEN: usize = 2;

/// Logical transaction identifier taken from the end of a step key, e.g. `T2` in `step4_T2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TransactionTag(String);

impl TransactionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Extract the tag suffix from a step key. `None` when the key is too short.
    pub fn from_step_key(key: &str) -> Option<Self> {
        let chars: Vec<char> = key.trim().chars().collect();
        if chars.len() < TAG_LEN {
            return None;
        }
        let tag: String = chars[chars.len() - TAG_LEN..].iter().collect();
        if tag.trim().len() < TAG_LEN {
            return None;
        }
        Some(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scenario step: statements that a single transaction sends back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub key: String,
    pub transaction: TransactionTag,
    pub statements: Vec<String>,
}

/// A decoded scenario ready to be scheduled.
///
/// `steps` keep declaration order and are never re-sorted: the order is the interleaving
/// that demonstrates the anomaly. `transactions` lists each tag once, in the order its first
/// step appears, which decides the session each tag is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub dialect: Dialect,
    pub test_id: String,
    /// Display-only annotation, never interpreted.
    pub comment: String,
    pub transactions: Vec<TransactionTag>,
    pub steps: Vec<Step>,
    /// Schema reset statements run once on the first session before any step.
    pub init_statements: Vec<String>,
}

impl Scenario {
    /// Build a scenario from ordered `(step key, statements)` pairs, deriving transaction tags.
    pub fn from_steps<I>(
        dialect: Dialect,
        test_id: impl Into<String>,
        init_statements: Vec<String>,
        steps: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let test_id = test_id.into();
        let mut transactions: Vec<TransactionTag> = Vec::new();
        let mut parsed = Vec::new();

        for (key, statements) in steps {
            let transaction = TransactionTag::from_step_key(&key).ok_or_else(|| {
                ParseError::malformed(format!(
                    "step '{key}' in {test_id} must end with a two character transaction tag"
                ))
            })?;
            if statements.is_empty() {
                return Err(ParseError::malformed(format!(
                    "step '{key}' in {test_id} has no statements"
                )));
            }
            if !transactions.contains(&transaction) {
                transactions.push(transaction.clone());
            }
            parsed.push(Step {
                key,
                transaction,
                statements,
            });
        }

        if parsed.is_empty() {
            return Err(ParseError::malformed(format!("{test_id} has no steps")));
        }
        if transactions.len() > MAX_TRANSACTIONS {
            return Err(ParseError::malformed(format!(
                "{test_id} uses {} transactions ({}), at most {MAX_TRANSACTIONS} are supported",
                transactions.len(),
                transactions
                    .iter()
                    .map(TransactionTag::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(Self {
            dialect,
            test_id,
            comment: String::new(),
            transactions,
            steps: parsed,
            init_statements,
        })
    }

    /// Attach the display comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Number of sessions the scenario needs.
    pub fn session_count(&self) -> usize {
        self.transactions.len()
    }

    /// Position of a tag in first-appearance order.
    pub fn transaction_index(&self, tag: &TransactionTag) -> Option<usize> {
        self.transactions.iter().position(|t| t == tag)
    }

    /// Steps as an ordered `step key -> statements` mapping, the shape they are declared in.
    pub fn render_steps(&self) -> IndexMap<String, Vec<String>> {
        self.steps
            .iter()
            .map(|step| (step.key.clone(), step.statements.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        pairs
            .iter()
            .map(|(key, statements)| {
                (
                    key.to_string(),
                    statements.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn tag_is_last_two_characters() {
        assert_eq!(
            TransactionTag::from_step_key("step12_T3").unwrap().as_str(),
            "T3"
        );
        assert_eq!(TransactionTag::from_step_key("T1").unwrap().as_str(), "T1");
        assert!(TransactionTag::from_step_key("x").is_none());
    }

    #[test]
    fn transactions_follow_first_appearance_not_lexical_order() {
        let scenario = Scenario::from_steps(
            Dialect::Postgres,
            "test9",
            Vec::new(),
            steps(&[
                ("step1_T2", &["A"]),
                ("step2_T3", &["B"]),
                ("step3_T2", &["C"]),
                ("step4_T1", &["D"]),
            ]),
        )
        .unwrap();
        let tags: Vec<_> = scenario.transactions.iter().map(|t| t.as_str()).collect();
        assert_eq!(tags, ["T2", "T3", "T1"]);
        assert_eq!(scenario.session_count(), 3);
        let keys: Vec<_> = scenario.steps.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["step1_T2", "step2_T3", "step3_T2", "step4_T1"]);
    }

    #[test]
    fn more_than_three_transactions_is_malformed() {
        let err = Scenario::from_steps(
            Dialect::Mysql,
            "test1",
            Vec::new(),
            steps(&[
                ("a_T1", &["A"]),
                ("b_T2", &["B"]),
                ("c_T3", &["C"]),
                ("d_T4", &["D"]),
            ]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ParseErrorKind::Malformed);
    }

    #[test]
    fn empty_steps_are_malformed() {
        assert!(Scenario::from_steps(Dialect::Mysql, "t", Vec::new(), Vec::new()).is_err());
        assert!(Scenario::from_steps(
            Dialect::Mysql,
            "t",
            Vec::new(),
            steps(&[("step1_T1", &[])])
        )
        .is_err());
    }
}
