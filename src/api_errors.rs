use thiserror::Error;

use crate::github_client::RequestOutcome;

#[derive(Error, Debug)]
/// Every way building the recent repository list can fail
pub enum Error {
    /// Required fields absent from a raw API object, all of them listed
    #[error("Object does not have required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Type of value for key {key} must be {expected}, was: {found}")]
    FieldType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Expected {expected} for {context}, was: {found}")]
    Shape {
        context: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Every key is present, but a value does not fit the entity
    #[error("Invalid {context} object: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request executor failure, carrying the normalized outcome untouched
    #[error("{0}")]
    Request(Box<RequestOutcome>),

    #[error("error creating user from response: {0}")]
    User(#[source] Box<Error>),

    #[error("error fetching languages of {repo}: {source}")]
    Languages {
        repo: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Outcome of the failed request behind this error, looking through
    /// any context the builders wrapped around it.
    pub fn outcome(&self) -> Option<&RequestOutcome> {
        match self {
            Error::Request(outcome) => Some(&**outcome),
            Error::User(source) | Error::Languages { source, .. } => source.outcome(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn missing_keys_lists_every_key() {
        let err = Error::MissingKeys(vec!["id".to_string(), "name".to_string()]);

        assert_eq!(
            err.to_string(),
            "Object does not have required keys: id, name"
        );
    }

    #[test]
    fn field_type_names_key_and_observed_type() {
        let err = Error::FieldType {
            key: "Rust".to_string(),
            expected: "number",
            found: "string".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Type of value for key Rust must be number, was: string"
        );
    }

    #[test]
    fn decode_error_names_entity_and_keeps_serde_cause() {
        let cause = serde_json::from_value::<u64>(serde_json::json!("many")).unwrap_err();
        let err = Error::Decode {
            context: "repository",
            source: cause,
        };

        assert!(err
            .to_string()
            .starts_with("Invalid repository object: invalid type: string"));
        assert!(err.source().is_some());
    }

    #[test]
    fn wrapped_user_error_keeps_cause() {
        let err = Error::User(Box::new(Error::MissingKeys(vec!["login".to_string()])));

        assert_eq!(
            err.to_string(),
            "error creating user from response: Object does not have required keys: login"
        );
        let source = err.source().expect("wrapped error exposes its cause");
        assert_eq!(
            source.to_string(),
            "Object does not have required keys: login"
        );
        assert!(err.outcome().is_none());
    }
}
