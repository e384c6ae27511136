//! ---
//! mvcc_section: "02-scenario-model"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Display-only annotations scanned from raw scenario text."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fmt;

use mvcc_common::Dialect;
use serde::Serialize;

use crate::document::ScenarioDocument;
use crate::error::Result;

/// A test id together with its annotation, as offered to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub id: String,
    pub comment: String,
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comment.is_empty() {
            f.write_str(&self.id)
        } else {
            write!(f, "{}  {}", self.id, self.comment)
        }
    }
}

/// Annotation trailing `test_id:` inside the dialect's test section.
///
/// Works on the raw text because YAML decoding drops comments. Returns the line from its
/// first `#`, or an empty string when the test or the comment is absent.
pub fn find_comment(raw: &str, dialect: Dialect, test_id: &str) -> String {
    let section_header = format!("{}:", dialect.tests_key());
    let test_key = format!("{test_id}:");
    let mut in_section = false;

    for line in raw.lines() {
        if !in_section {
            in_section = line.trim_end().starts_with(&section_header);
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            // next top-level key
            break;
        }
        if trimmed.starts_with(&test_key) {
            return trimmed
                .find('#')
                .map(|at| trimmed[at..].to_owned())
                .unwrap_or_default();
        }
    }
    String::new()
}

/// Every test declared for `dialect`, in declaration order, with its annotation.
pub fn list_tests(raw: &str, dialect: Dialect) -> Result<Vec<TestSummary>> {
    let document: ScenarioDocument = raw.parse()?;
    Ok(document
        .test_ids(dialect)?
        .into_iter()
        .map(|id| TestSummary {
            comment: find_comment(raw, dialect, &id),
            id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
mysql-tests:
  test1:    # Anomaly|Dirty Read
    step1_T1: SELECT 1;
postgres-tests:
  # section comment
  test1:    # Anomaly|Lost Update - Isolation|Serializable
    step1_T1: SELECT 1;

  test10:   # Anomaly|Phantom
    step1_T1: SELECT 1;
  test2:
    step1_T1: SELECT 1;
sqlserver-tests:
  test3:    # belongs to sqlserver
    step1_T1: SELECT 1;
";

    #[test]
    fn comment_is_taken_from_the_dialect_section() {
        assert_eq!(
            find_comment(DOC, Dialect::Postgres, "test1"),
            "# Anomaly|Lost Update - Isolation|Serializable"
        );
        assert_eq!(
            find_comment(DOC, Dialect::Mysql, "test1"),
            "# Anomaly|Dirty Read"
        );
        assert_eq!(find_comment(DOC, Dialect::Postgres, "test10"), "# Anomaly|Phantom");
    }

    #[test]
    fn missing_comment_or_test_yields_empty_string() {
        assert_eq!(find_comment(DOC, Dialect::Postgres, "test2"), "");
        assert_eq!(find_comment(DOC, Dialect::Postgres, "test3"), "");
        assert_eq!(find_comment(DOC, Dialect::Oracle, "test1"), "");
    }

    #[test]
    fn list_tests_keeps_declaration_order() {
        let tests = list_tests(DOC, Dialect::Postgres).unwrap();
        let ids: Vec<_> = tests.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["test1", "test10", "test2"]);
        assert_eq!(tests[1].to_string(), "test10  # Anomaly|Phantom");
        assert_eq!(tests[2].to_string(), "test2");
        assert!(list_tests(DOC, Dialect::Oracle).is_err());
    }
}
