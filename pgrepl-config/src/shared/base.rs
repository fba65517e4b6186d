use thiserror::Error;

use crate::shared::PgSslMode;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The sslmode requires TLS but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `sslmode` is `{0}`")]
    MissingTrustedRootCerts(PgSslMode),
    /// Port zero cannot be connected to.
    #[error("`port` cannot be zero")]
    PortZero,
    /// Host is empty.
    #[error("`host` cannot be empty")]
    EmptyHost,
    /// The sslmode is not one of the libpq spellings.
    #[error("`{0}` is not a valid sslmode")]
    InvalidSslMode(String),
    /// Retry backoff parameters are inconsistent.
    #[error("Invalid retry config: {0}")]
    InvalidRetry(String),
}
