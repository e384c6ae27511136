//! ---
//! mvcc_section: "01-core-functionality"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Database dialect profiles and connection parameters."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

const MASKED_PASSWORD: &str = "****";

/// Database products a scenario can target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dialect {
    Oracle,
    Mysql,
    Postgres,
    Sqlserver,
}

impl Dialect {
    /// Key of the connection section inside a scenario document, e.g. `postgres-config`.
    pub fn config_key(&self) -> String {
        format!("{self}-config")
    }

    /// Key of the test collection inside a scenario document, e.g. `postgres-tests`.
    pub fn tests_key(&self) -> String {
        format!("{self}-tests")
    }

    /// Name of the system service hosting this database on Debian-like systems.
    pub fn service_name(&self) -> &'static str {
        match self {
            Dialect::Oracle => "oracle-xe",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgresql",
            Dialect::Sqlserver => "mssql-server",
        }
    }

    /// Comma separated list of every supported dialect, for operator messages.
    pub fn supported() -> String {
        Dialect::iter()
            .map(|dialect| dialect.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Control tokens and prompt patterns for the dialect's interactive client.
    pub fn profile(&self) -> DialectProfile {
        match self {
            Dialect::Mysql => DialectProfile {
                dialect: *self,
                clear_command: "system clear",
                autocommit_on: "SET autocommit=1;",
                autocommit_off: "SET autocommit=0;",
                submit_token: None,
                success_prompts: &["mysql>", "]>"],
                failure_patterns: FailurePatterns::STANDARD,
                init_skip: &[],
                isolation_setup: &[],
            },
            Dialect::Postgres => DialectProfile {
                dialect: *self,
                clear_command: "\\! clear",
                autocommit_on: "\\set AUTOCOMMIT on",
                autocommit_off: "\\set AUTOCOMMIT off",
                submit_token: None,
                success_prompts: &["=#", "=>"],
                failure_patterns: FailurePatterns::STANDARD,
                init_skip: &[],
                isolation_setup: &[],
            },
            Dialect::Sqlserver => DialectProfile {
                dialect: *self,
                clear_command: ":RESET",
                autocommit_on: "SET IMPLICIT_TRANSACTIONS OFF",
                autocommit_off: "SET IMPLICIT_TRANSACTIONS ON",
                submit_token: Some("GO"),
                success_prompts: &["1>"],
                failure_patterns: FailurePatterns::STANDARD,
                init_skip: &["COMMIT;"],
                isolation_setup: &[
                    "ALTER DATABASE {db} SET READ_COMMITTED_SNAPSHOT ON;",
                    "ALTER DATABASE {db} SET ALLOW_SNAPSHOT_ISOLATION ON;",
                ],
            },
            Dialect::Oracle => DialectProfile {
                dialect: *self,
                clear_command: "clear screen",
                autocommit_on: "set autocommit on;",
                autocommit_off: "set autocommit off;",
                submit_token: None,
                success_prompts: &["SQL>"],
                failure_patterns: FailurePatterns::STANDARD,
                init_skip: &[],
                isolation_setup: &[],
            },
        }
    }
}

/// Substrings in client output that classify a failed connection attempt.
///
/// Groups are checked in field order: database, host, then authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePatterns {
    pub database: &'static [&'static str],
    pub host: &'static [&'static str],
    pub authentication: &'static [&'static str],
}

impl FailurePatterns {
    /// Error messages emitted by the mysql, psql, sqlcmd, and sqlplus clients.
    pub const STANDARD: FailurePatterns = FailurePatterns {
        database: &[
            "Unknown database",
            "FATAL:  database",
            "Cannot open database",
            "ORA-12514",
        ],
        host: &[
            "Unknown MySQL server host",
            "could not translate host name",
            "Login timeout expired",
            "could not connect",
            "could not resolve",
            "ORA-12541",
        ],
        authentication: &[
            "Access denied",
            "authentication failed",
            "psql: warning: extra command",
            "Login failed",
            "invalid username/password",
        ],
    };
}

/// Everything a component needs to know about a dialect's interactive client.
///
/// Selected once per run so the session components never branch on [`Dialect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectProfile {
    pub dialect: Dialect,
    pub clear_command: &'static str,
    pub autocommit_on: &'static str,
    pub autocommit_off: &'static str,
    /// Confirmation command that makes the server execute the buffered batch.
    pub submit_token: Option<&'static str>,
    /// Prompt fragments that show the client is connected and ready.
    pub success_prompts: &'static [&'static str],
    pub failure_patterns: FailurePatterns,
    /// Initialization statements that must not be sent to this dialect.
    pub init_skip: &'static [&'static str],
    /// Snapshot isolation setup, `{db}` is replaced with the database name.
    pub isolation_setup: &'static [&'static str],
}

impl DialectProfile {
    /// Shell command that starts the dialect's client against the given database.
    pub fn connection_command(&self, connection: &ConnectionProfile) -> String {
        self.render_connection(connection, &connection.password)
    }

    /// Same as [`Self::connection_command`] with the password masked, for logs and errors.
    pub fn masked_connection_command(&self, connection: &ConnectionProfile) -> String {
        self.render_connection(connection, MASKED_PASSWORD)
    }

    /// Isolation setup statements with the database name substituted.
    pub fn isolation_statements(&self, connection: &ConnectionProfile) -> Vec<String> {
        self.isolation_setup
            .iter()
            .map(|template| template.replace("{db}", &connection.database))
            .collect()
    }

    /// Whether an initialization statement is skipped for this dialect.
    pub fn skips_init_statement(&self, statement: &str) -> bool {
        self.init_skip.iter().any(|skip| *skip == statement.trim())
    }

    fn render_connection(&self, connection: &ConnectionProfile, password: &str) -> String {
        let ConnectionProfile {
            host,
            database,
            user,
            ..
        } = connection;
        match self.dialect {
            Dialect::Mysql => format!("mysql -u {user} -p{password} -D {database} -h {host}"),
            Dialect::Postgres => {
                format!("export PGPASSWORD='{password}';  psql -h {host} -d {database} -U {user}")
            }
            Dialect::Sqlserver => {
                format!("sqlcmd -U {user} -P{password} -d {database} -S {host}")
            }
            Dialect::Oracle => format!("sqlplus {user}/{password}@{host}/{database}"),
        }
    }
}

/// Connection parameters read from the scenario document's `<dialect>-config` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &MASKED_PASSWORD)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionProfile {
        ConnectionProfile {
            host: "localhost".into(),
            database: "mvcc".into(),
            user: "tester".into(),
            password: "s3cret".into(),
        }
    }

    #[test]
    fn dialect_parses_case_insensitively() {
        assert_eq!("Postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("SQLSERVER".parse::<Dialect>().unwrap(), Dialect::Sqlserver);
        assert!("db2".parse::<Dialect>().is_err());
        assert_eq!(Dialect::Mysql.tests_key(), "mysql-tests");
        assert_eq!(Dialect::Oracle.config_key(), "oracle-config");
    }

    #[test]
    fn connection_commands_follow_client_conventions() {
        let conn = connection();
        assert_eq!(
            Dialect::Mysql.profile().connection_command(&conn),
            "mysql -u tester -ps3cret -D mvcc -h localhost"
        );
        assert_eq!(
            Dialect::Oracle.profile().connection_command(&conn),
            "sqlplus tester/s3cret@localhost/mvcc"
        );
        assert_eq!(
            Dialect::Sqlserver.profile().connection_command(&conn),
            "sqlcmd -U tester -Ps3cret -d mvcc -S localhost"
        );
        assert!(Dialect::Postgres
            .profile()
            .connection_command(&conn)
            .starts_with("export PGPASSWORD='s3cret';"));
    }

    #[test]
    fn masked_command_and_debug_hide_password() {
        let conn = connection();
        for dialect in Dialect::iter() {
            let masked = dialect.profile().masked_connection_command(&conn);
            assert!(!masked.contains("s3cret"), "{dialect} leaked password");
        }
        assert!(!format!("{conn:?}").contains("s3cret"));
    }

    #[test]
    fn only_sqlserver_needs_submit_and_isolation_setup() {
        let conn = connection();
        let sqlserver = Dialect::Sqlserver.profile();
        assert_eq!(sqlserver.submit_token, Some("GO"));
        assert_eq!(
            sqlserver.isolation_statements(&conn),
            vec![
                "ALTER DATABASE mvcc SET READ_COMMITTED_SNAPSHOT ON;".to_owned(),
                "ALTER DATABASE mvcc SET ALLOW_SNAPSHOT_ISOLATION ON;".to_owned(),
            ]
        );
        assert!(sqlserver.skips_init_statement("COMMIT;"));

        for dialect in [Dialect::Mysql, Dialect::Postgres, Dialect::Oracle] {
            let profile = dialect.profile();
            assert!(profile.submit_token.is_none());
            assert!(profile.isolation_statements(&conn).is_empty());
            assert!(!profile.skips_init_statement("COMMIT;"));
        }
    }
}
