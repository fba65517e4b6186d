use std::io::BufReader;
use std::ops::Deref;
use std::sync::Arc;

use pgrepl_config::shared::{IntoConnectOptions, ProviderConfig};
use rustls::ClientConfig;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error};

/// Errors raised while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("error reading trusted root certificates: {0}")]
    RootCerts(#[from] std::io::Error),

    #[error("error configuring tls: {0}")]
    Tls(#[from] rustls::Error),

    #[error("error connecting to database: {0}")]
    Connect(#[from] tokio_postgres::Error),
}

/// A connection scoped to a single resource operation.
///
/// The connection is driven by a background task. Call [`PgConnection::close`] once the
/// operation is done so the session is terminated before the operation returns.
#[derive(Debug)]
pub struct PgConnection {
    client: Client,
    connection_task: JoinHandle<()>,
}

impl PgConnection {
    /// Returns the client used to issue statements on this connection.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Closes the connection and waits for the background task to finish.
    pub async fn close(self) {
        // Dropping the last client makes the connection future send a terminate message
        // and resolve.
        drop(self.client);

        if let Err(err) = self.connection_task.await {
            error!("postgres connection task failed to complete: {}", err);
        }
    }
}

impl Deref for PgConnection {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Opens a connection to `database` with the settings of `config`.
///
/// An empty `database` connects to the database named after the user. The connection
/// uses TLS when trusted root certificates are configured.
pub async fn connect(
    config: &ProviderConfig,
    database: &str,
) -> Result<PgConnection, ConnectionError> {
    let options: Config = config.with_db(database);
    debug!(uri = %config.redacted_uri(database), "connecting to postgres");

    let trusted_root_certs = config
        .trusted_root_certs
        .as_deref()
        .filter(|certs| !certs.trim().is_empty());

    if let Some(trusted_root_certs) = trusted_root_certs {
        let tls = make_rustls_connect(trusted_root_certs)?;
        let (client, connection) = options.connect(tls).await?;
        let connection_task = spawn_postgres_connection::<MakeRustlsConnect>(connection);

        Ok(PgConnection {
            client,
            connection_task,
        })
    } else {
        let (client, connection) = options.connect(NoTls).await?;
        let connection_task = spawn_postgres_connection::<NoTls>(connection);

        Ok(PgConnection {
            client,
            connection_task,
        })
    }
}

/// Returns the name of the database `client` is connected to.
pub async fn current_database(client: &Client) -> Result<String, tokio_postgres::Error> {
    let row = client.query_one("select current_database()::text;", &[]).await?;

    Ok(row.get(0))
}

/// Builds a rustls connector trusting the PEM-encoded `trusted_root_certs`.
fn make_rustls_connect(trusted_root_certs: &str) -> Result<MakeRustlsConnect, ConnectionError> {
    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader = BufReader::new(trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        let cert = cert?;
        root_store.add(cert)?;
    }

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(MakeRustlsConnect::new(tls_config))
}

/// Spawns a background task driving `connection` until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>) -> JoinHandle<()>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        if let Err(e) = connection.await {
            error!("an error occurred during the postgres connection: {}", e);
            return;
        }

        debug!("postgres connection terminated successfully")
    }
    .instrument(span);

    tokio::spawn(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_root_certificates() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";

        assert!(make_rustls_connect(pem).is_err());
    }

    #[test]
    fn empty_root_certificates_build_a_connector() {
        assert!(make_rustls_connect("").is_ok());
    }
}
