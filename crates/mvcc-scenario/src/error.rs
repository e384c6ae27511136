//! ---
//! mvcc_section: "02-scenario-model"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Scenario decoding errors."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use mvcc_common::Dialect;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Coarse classification of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Malformed,
    UnknownTest,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("scenario document is malformed: {reason}")]
    Malformed {
        reason: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },
    #[error("test '{test}' does not exist under '{dialect}-tests'")]
    UnknownTest { dialect: Dialect, test: String },
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::Malformed { .. } => ParseErrorKind::Malformed,
            ParseError::UnknownTest { .. } => ParseErrorKind::UnknownTest,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn yaml(reason: impl Into<String>, source: serde_yaml::Error) -> Self {
        ParseError::Malformed {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn missing_key(key: &str) -> Self {
        Self::malformed(format!("required key '{key}' does not exist"))
    }
}
