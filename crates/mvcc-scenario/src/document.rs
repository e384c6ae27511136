//! ---
//! mvcc_section: "02-scenario-model"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "YAML scenario document decoding."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use indexmap::IndexMap;
use mvcc_common::{ConnectionProfile, Dialect};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::comments::find_comment;
use crate::error::{ParseError, Result};
use crate::model::Scenario;

const TABLE_INITIALIZATION: &str = "table-initialization";

/// A scenario document decoded from YAML, with section order preserved.
#[derive(Debug, Clone)]
pub struct ScenarioDocument {
    raw: String,
    root: Mapping,
}

/// Scenario plus the connection parameters for its dialect.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub scenario: Scenario,
    pub connection: ConnectionProfile,
}

/// Decode `raw` and extract `test_id` for `dialect` along with its connection parameters.
pub fn parse(raw: &str, dialect: Dialect, test_id: &str) -> Result<LoadedScenario> {
    let document: ScenarioDocument = raw.parse()?;
    document.load(dialect, test_id)
}

impl std::str::FromStr for ScenarioDocument {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(raw)
            .map_err(|source| ParseError::yaml("cannot decode YAML", source))?;
        let root = match value {
            Value::Mapping(root) => root,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ParseError::malformed(
                    "top level of a scenario document must be a mapping",
                ))
            }
        };
        Ok(Self {
            raw: raw.to_owned(),
            root,
        })
    }
}

impl ScenarioDocument {
    /// Source text the document was decoded from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Connection parameters from `<dialect>-config`.
    pub fn connection(&self, dialect: Dialect) -> Result<ConnectionProfile> {
        let key = dialect.config_key();
        let section = self.section(&key)?;
        let raw: RawConnection = serde_yaml::from_value(section.clone())
            .map_err(|source| ParseError::yaml(format!("invalid '{key}' section"), source))?;
        Ok(ConnectionProfile {
            host: raw.host,
            database: raw.db,
            user: raw.user,
            password: raw.password,
        })
    }

    /// Statements from `table-initialization`, in declaration order.
    pub fn init_statements(&self) -> Result<Vec<String>> {
        let section = self.section(TABLE_INITIALIZATION)?;
        let raw: RawInitialization = serde_yaml::from_value(section.clone()).map_err(|source| {
            ParseError::yaml(format!("invalid '{TABLE_INITIALIZATION}' section"), source)
        })?;
        Ok(match raw {
            RawInitialization::List(statements) => {
                statements.into_iter().map(single_terminator).collect()
            }
            RawInitialization::Keyed(entries) => entries
                .into_values()
                .flat_map(RawStatements::into_vec)
                .collect(),
        })
    }

    /// Test ids under `<dialect>-tests`, in declaration order.
    pub fn test_ids(&self, dialect: Dialect) -> Result<Vec<String>> {
        Ok(self.tests(dialect)?.into_keys().collect())
    }

    /// Decode one scenario and the connection parameters for its dialect.
    pub fn load(&self, dialect: Dialect, test_id: &str) -> Result<LoadedScenario> {
        let connection = self.connection(dialect)?;
        let init_statements = self.init_statements()?;
        let mut tests = self.tests(dialect)?;
        let steps = tests
            .shift_remove(test_id)
            .ok_or_else(|| ParseError::UnknownTest {
                dialect,
                test: test_id.to_owned(),
            })?
            .ok_or_else(|| ParseError::malformed(format!("{test_id} has no steps")))?;

        let scenario = Scenario::from_steps(
            dialect,
            test_id,
            init_statements,
            steps.into_iter().map(|(key, statements)| {
                let statements = statements.map(RawStatements::into_vec).unwrap_or_default();
                (key, statements)
            }),
        )?
        .with_comment(find_comment(&self.raw, dialect, test_id));

        debug!(
            %dialect,
            test = test_id,
            steps = scenario.steps.len(),
            transactions = scenario.transactions.len(),
            "scenario decoded"
        );
        Ok(LoadedScenario {
            scenario,
            connection,
        })
    }

    fn tests(&self, dialect: Dialect) -> Result<RawTests> {
        let key = dialect.tests_key();
        let section = self.section(&key)?;
        serde_yaml::from_value(section.clone())
            .map_err(|source| ParseError::yaml(format!("invalid '{key}' section"), source))
    }

    fn section(&self, key: &str) -> Result<&Value> {
        match self.root.get(key) {
            Some(Value::Null) | None => Err(ParseError::missing_key(key)),
            Some(value) => Ok(value),
        }
    }
}

/// test id -> (step key -> statements); a bare `testN:` key decodes to `None`.
type RawTests = IndexMap<String, Option<IndexMap<String, Option<RawStatements>>>>;

#[derive(Debug, Deserialize)]
struct RawConnection {
    #[serde(deserialize_with = "deserialize_string")]
    user: String,
    #[serde(deserialize_with = "deserialize_string")]
    password: String,
    #[serde(deserialize_with = "deserialize_string")]
    db: String,
    #[serde(deserialize_with = "deserialize_string")]
    host: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInitialization {
    List(Vec<String>),
    Keyed(IndexMap<String, RawStatements>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStatements {
    Many(Vec<String>),
    One(String),
}

impl RawStatements {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawStatements::Many(statements) => {
                statements.into_iter().map(single_terminator).collect()
            }
            RawStatements::One(statement) => vec![single_terminator(statement)],
        }
    }
}

/// Older documents end statements with `;;` because one `;` used to be lost on the way to
/// the terminal. Statements are now typed verbatim, so the doubled form is read as one `;`.
fn single_terminator(mut statement: String) -> String {
    if statement.trim_end().ends_with(";;") {
        statement.truncate(statement.trim_end().len() - 1);
    }
    statement
}

fn deserialize_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;

    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("string, number or boolean")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_owned())
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> std::result::Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_bool<E>(self, value: bool) -> std::result::Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(Visitor)
}
