use std::error;
use std::fmt;

use pgrepl_config::shared::ValidationError;
use pgrepl_postgres::connection::ConnectionError;
use pgrepl_postgres::identifier::IdentifierError;
use pgrepl_postgres::replication::replica_identity::ReplicaIdentityError;

/// Convenient result type for provider operations using [`ProviderError`] as the error type.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Main error type for provider operations.
///
/// A [`ProviderError`] carries an [`ErrorKind`], a static description and, optionally, a
/// dynamic detail. Several errors can be aggregated into one, which is how schema
/// validation reports every offending attribute at once.
#[derive(Debug, Clone)]
pub struct ProviderError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    Many(Vec<ProviderError>),
}

/// Categories of errors that can occur while serving a resource operation.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration & Schema Errors
    ConfigError,
    ValidationError,
    UnknownResourceType,

    // Connection Errors
    ConnectionFailed,
    AuthenticationError,
    EncryptionError,

    // Query & Execution Errors
    QueryFailed,
    PermissionDenied,
    ObjectNotFound,
    DuplicateObject,
    ObjectInUse,
    ResourceExhausted,
    Timeout,

    // State Errors
    InvalidState,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // Unknown / Uncategorized
    Unknown,
}

impl ProviderError {
    /// Creates a [`ProviderError`] containing multiple aggregated errors.
    pub fn many(errors: Vec<ProviderError>) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            _ => None,
        }
    }

    /// Returns a copy of this error with `description` replacing the static description.
    ///
    /// The kind and detail are preserved, so the SQLSTATE classification of a database
    /// error survives while the message states which step failed.
    pub fn with_description(self, description: &'static str) -> ProviderError {
        let repr = match self.repr {
            ErrorRepr::WithDescription(kind, _) => ErrorRepr::WithDescription(kind, description),
            ErrorRepr::WithDescriptionAndDetail(kind, _, detail) => {
                ErrorRepr::WithDescriptionAndDetail(kind, description, detail)
            }
            repr @ ErrorRepr::Many(_) => repr,
        };

        ProviderError { repr }
    }
}

impl PartialEq for ProviderError {
    fn eq(&self, other: &ProviderError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;

                Ok(())
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)?;

                Ok(())
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")?;
                } else if errors.len() == 1 {
                    errors[0].fmt(f)?;
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl error::Error for ProviderError {}

/// Creates a [`ProviderError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ProviderError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Creates a [`ProviderError`] from an error kind, static description, and dynamic detail.
impl From<(ErrorKind, &'static str, String)> for ProviderError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl<E> From<Vec<E>> for ProviderError
where
    E: Into<ProviderError>,
{
    fn from(errors: Vec<E>) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`] to [`ProviderError`] based on the error category.
impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> ProviderError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`tokio_postgres::Error`] to [`ProviderError`] with a kind derived from the
/// SQLSTATE code.
impl From<tokio_postgres::Error> for ProviderError {
    fn from(err: tokio_postgres::Error) -> ProviderError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // Connection errors (08xxx)
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL connection error",
                    ),

                    // Authentication errors (28xxx)
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::AuthenticationError,
                        "PostgreSQL authentication failed",
                    ),

                    // Missing database (3D000)
                    SqlState::INVALID_CATALOG_NAME => (
                        ErrorKind::ObjectNotFound,
                        "PostgreSQL database does not exist",
                    ),

                    // Object not found errors (42xxx)
                    SqlState::UNDEFINED_TABLE
                    | SqlState::UNDEFINED_OBJECT
                    | SqlState::UNDEFINED_SCHEMA
                    | SqlState::UNDEFINED_FILE => (
                        ErrorKind::ObjectNotFound,
                        "PostgreSQL object not found",
                    ),

                    SqlState::DUPLICATE_OBJECT => (
                        ErrorKind::DuplicateObject,
                        "PostgreSQL object already exists",
                    ),

                    SqlState::INSUFFICIENT_PRIVILEGE => (
                        ErrorKind::PermissionDenied,
                        "PostgreSQL permission denied",
                    ),

                    // Syntax errors (42xxx)
                    SqlState::SYNTAX_ERROR
                    | SqlState::SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION
                    | SqlState::INVALID_NAME
                    | SqlState::NAME_TOO_LONG => (
                        ErrorKind::QueryFailed,
                        "PostgreSQL syntax error",
                    ),

                    // Slot or table held by another session (55xxx)
                    SqlState::OBJECT_IN_USE | SqlState::LOCK_NOT_AVAILABLE => (
                        ErrorKind::ObjectInUse,
                        "PostgreSQL object is in use",
                    ),

                    // Prerequisite state errors, e.g. `wal_level` below `logical` (55000)
                    SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE => (
                        ErrorKind::InvalidState,
                        "PostgreSQL object not in prerequisite state",
                    ),

                    // Resource errors (53xxx)
                    SqlState::INSUFFICIENT_RESOURCES
                    | SqlState::OUT_OF_MEMORY
                    | SqlState::TOO_MANY_CONNECTIONS
                    | SqlState::CONFIGURATION_LIMIT_EXCEEDED => (
                        ErrorKind::ResourceExhausted,
                        "PostgreSQL resource limitation",
                    ),

                    // Operator intervention (57xxx)
                    SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL server is shutting down",
                    ),
                    SqlState::QUERY_CANCELED => {
                        (ErrorKind::Timeout, "PostgreSQL query canceled")
                    }

                    _ => (ErrorKind::QueryFailed, "PostgreSQL error"),
                }
            }
            // No SQL state means connection issue
            None => (
                ErrorKind::ConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

impl From<ConnectionError> for ProviderError {
    fn from(err: ConnectionError) -> ProviderError {
        match err {
            ConnectionError::RootCerts(err) => ProviderError {
                repr: ErrorRepr::WithDescriptionAndDetail(
                    ErrorKind::EncryptionError,
                    "Trusted root certificates could not be read",
                    err.to_string(),
                ),
            },
            ConnectionError::Tls(err) => ProviderError {
                repr: ErrorRepr::WithDescriptionAndDetail(
                    ErrorKind::EncryptionError,
                    "TLS configuration failed",
                    err.to_string(),
                ),
            },
            ConnectionError::Connect(err) => {
                let err = ProviderError::from(err);
                // Statements run only once connected, so whatever failed here failed to
                // connect unless the server named a more specific cause.
                match err.kind() {
                    ErrorKind::AuthenticationError
                    | ErrorKind::ObjectNotFound
                    | ErrorKind::ResourceExhausted => err,
                    _ => ProviderError {
                        repr: ErrorRepr::WithDescriptionAndDetail(
                            ErrorKind::ConnectionFailed,
                            "Error connecting to database",
                            err.detail().unwrap_or_default().to_owned(),
                        ),
                    },
                }
            }
        }
    }
}

impl From<ValidationError> for ProviderError {
    fn from(err: ValidationError) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "Invalid provider configuration",
                err.to_string(),
            ),
        }
    }
}

impl From<IdentifierError> for ProviderError {
    fn from(err: IdentifierError) -> ProviderError {
        ProviderError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ValidationError,
                "Invalid identifier",
                err.to_string(),
            ),
        }
    }
}

impl From<ReplicaIdentityError> for ProviderError {
    fn from(err: ReplicaIdentityError) -> ProviderError {
        match err {
            ReplicaIdentityError::Query(err) => err.into(),
            ReplicaIdentityError::UnknownCode(code) => ProviderError {
                repr: ErrorRepr::WithDescriptionAndDetail(
                    ErrorKind::InvalidState,
                    "Unknown replica identity code",
                    code,
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, provider_error};

    #[test]
    fn test_simple_error_creation() {
        let err = ProviderError::from((ErrorKind::ConnectionFailed, "Database connection failed"));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert_eq!(err.detail(), None);
        assert_eq!(err.kinds(), vec![ErrorKind::ConnectionFailed]);
    }

    #[test]
    fn test_error_with_detail() {
        let err = ProviderError::from((
            ErrorKind::QueryFailed,
            "Error creating replication slot",
            "logical decoding requires wal_level >= logical".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert_eq!(
            err.detail(),
            Some("logical decoding requires wal_level >= logical")
        );
    }

    #[test]
    fn test_multiple_errors() {
        let errors = vec![
            ProviderError::from((ErrorKind::ValidationError, "Missing attribute")),
            ProviderError::from((ErrorKind::ValidationError, "Wrong attribute type", "port".to_string())),
            ProviderError::from((ErrorKind::ConfigError, "Invalid provider configuration")),
        ];
        let multi_err = ProviderError::many(errors);

        assert_eq!(multi_err.kind(), ErrorKind::ValidationError);
        assert_eq!(
            multi_err.kinds(),
            vec![
                ErrorKind::ValidationError,
                ErrorKind::ValidationError,
                ErrorKind::ConfigError
            ]
        );
        assert_eq!(multi_err.detail(), Some("port"));
    }

    #[test]
    fn test_empty_multiple_errors() {
        let multi_err = ProviderError::many(vec![]);
        assert_eq!(multi_err.kind(), ErrorKind::Unknown);
        assert_eq!(multi_err.kinds(), vec![]);
        assert_eq!(multi_err.detail(), None);
    }

    #[test]
    fn test_error_display_with_detail() {
        let err = ProviderError::from((
            ErrorKind::ObjectNotFound,
            "Unable to read replica identity",
            "relation \"foo\" does not exist".to_string(),
        ));
        let display_str = format!("{err}");
        assert_eq!(
            display_str,
            "ObjectNotFound: Unable to read replica identity -> relation \"foo\" does not exist"
        );
    }

    #[test]
    fn test_multiple_errors_display() {
        let errors = vec![
            ProviderError::from((ErrorKind::ValidationError, "Missing attribute")),
            ProviderError::from((ErrorKind::ValidationError, "Wrong attribute type")),
        ];
        let display_str = format!("{}", ProviderError::many(errors));
        assert!(display_str.contains("Multiple errors occurred (2 total)"));
        assert!(display_str.contains("1: ValidationError: Missing attribute"));
        assert!(display_str.contains("2: ValidationError: Wrong attribute type"));
    }

    #[test]
    fn test_with_description_keeps_kind_and_detail() {
        let err = ProviderError::from((
            ErrorKind::PermissionDenied,
            "PostgreSQL permission denied",
            "must be owner of table foo".to_string(),
        ))
        .with_description("Error altering table");

        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.detail(), Some("must be owner of table foo"));
        assert!(err.to_string().contains("Error altering table"));
    }

    #[test]
    fn test_macro_usage() {
        let err = provider_error!(ErrorKind::ValidationError, "Invalid slot name");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = provider_error!(ErrorKind::ValidationError, "Invalid slot name", "Slot-1");
        assert_eq!(err.detail(), Some("Slot-1"));
    }

    #[test]
    fn test_bail_macro() {
        fn fails() -> ProviderResult<i32> {
            bail!(ErrorKind::InvalidState, "Replica identity is not full", "default");
        }

        let err = fails().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.detail(), Some("default"));
    }

    #[test]
    fn test_json_error_classification() {
        let err = serde_json::from_str::<serde_json::Value>("{ invalid").unwrap_err();
        let err = ProviderError::from(err);
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn test_validation_error_is_config_error() {
        let err = ProviderError::from(ValidationError::PortZero);
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn test_identifier_error_is_validation_error() {
        let err = ProviderError::from(IdentifierError::Empty("".to_string()));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
