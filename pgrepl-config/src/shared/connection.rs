use std::fmt;
use std::str::FromStr;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::{ProviderConfig, ValidationError};

/// SSL negotiation mode, spelled the way libpq spells `sslmode`.
///
/// We use our own type because the `tokio_postgres` enum only knows about a subset of
/// the modes and doesn't implement [`Deserialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PgSslMode {
    /// Only try a non-SSL connection.
    Disable,
    /// First try a non-SSL connection; if that fails, try an SSL connection.
    Allow,
    /// First try an SSL connection; if that fails, try a non-SSL connection.
    #[default]
    Prefer,
    /// Only try an SSL connection.
    Require,
    /// Only try an SSL connection, and verify that the server certificate is issued by a
    /// trusted certificate authority (CA).
    VerifyCa,
    /// Only try an SSL connection; verify that the server certificate is issued by a trusted
    /// CA and that the requested server host name matches that in the certificate.
    VerifyFull,
}

impl PgSslMode {
    /// Returns the libpq spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PgSslMode::Disable => "disable",
            PgSslMode::Allow => "allow",
            PgSslMode::Prefer => "prefer",
            PgSslMode::Require => "require",
            PgSslMode::VerifyCa => "verify-ca",
            PgSslMode::VerifyFull => "verify-full",
        }
    }

    /// Returns `true` when the connection must not fall back to plaintext.
    ///
    /// TLS connections always verify the server against the configured root
    /// certificates, so these modes need them.
    pub fn requires_tls(&self) -> bool {
        matches!(
            self,
            PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull
        )
    }
}

impl fmt::Display for PgSslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PgSslMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(PgSslMode::Disable),
            "allow" => Ok(PgSslMode::Allow),
            "prefer" => Ok(PgSslMode::Prefer),
            "require" => Ok(PgSslMode::Require),
            "verify-ca" => Ok(PgSslMode::VerifyCa),
            "verify-full" => Ok(PgSslMode::VerifyFull),
            other => Err(ValidationError::InvalidSslMode(other.to_owned())),
        }
    }
}

impl From<PgSslMode> for TokioPgSslMode {
    fn from(value: PgSslMode) -> Self {
        // `tokio_postgres` only negotiates; certificate verification is done by the rustls
        // connector, so the verifying modes collapse into `Require`.
        match value {
            PgSslMode::Disable => TokioPgSslMode::Disable,
            PgSslMode::Allow | PgSslMode::Prefer => TokioPgSslMode::Prefer,
            PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull => {
                TokioPgSslMode::Require
            }
        }
    }
}

/// A trait which converts the provider configuration into crate specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Creates connection options without an explicit database.
    ///
    /// Postgres then connects to the database named after the user.
    fn without_db(&self) -> Output;

    /// Creates connection options for the given database.
    ///
    /// An empty database name behaves like [`IntoConnectOptions::without_db`].
    fn with_db(&self, database: &str) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for ProviderConfig {
    fn without_db(&self) -> TokioPgConnectOptions {
        let mut config = TokioPgConnectOptions::new();
        config
            .host(self.host.clone())
            .port(self.port)
            .user(self.user.clone())
            .password(self.password.expose_secret())
            .ssl_mode(self.sslmode.into());

        config
    }

    fn with_db(&self, database: &str) -> TokioPgConnectOptions {
        let mut options: TokioPgConnectOptions = self.without_db();
        if !database.is_empty() {
            options.dbname(database);
        }

        options
    }
}
