use pg_escape::{quote_identifier, quote_literal};
use pgrepl_config::shared::{IntoConnectOptions, ProviderConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::info;
use uuid::Uuid;

use crate::identifier::TableIdentifier;
use crate::replication::replica_identity::{ReplicaIdentity, get_replica_identity};

/// PostgreSQL database wrapper for testing operations.
///
/// Every instance owns a freshly created database with a random name. The database, and
/// every replication slot bound to it, is dropped when the instance is dropped.
pub struct PgDatabase {
    pub config: ProviderConfig,
    pub name: String,
    pub client: Option<Client>,
}

impl PgDatabase {
    /// Creates a new test database with automatic cleanup.
    pub async fn new(config: ProviderConfig) -> Self {
        // We create a random database name to avoid conflicts with existing databases.
        let name = Uuid::new_v4().to_string();
        let client = create_pg_database(&config, &name).await;

        Self {
            config,
            name,
            client: Some(client),
        }
    }

    /// Creates a new table with the given name and column definitions.
    ///
    /// Optionally adds a primary key column named `id` of type `bigserial`.
    pub async fn create_table(
        &self,
        table: &TableIdentifier,
        add_pk_col: bool,
        columns: &[(&str, &str)], // (column_name, column_type)
    ) -> Result<(), tokio_postgres::Error> {
        let columns_str = columns
            .iter()
            .map(|(name, typ)| format!("{name} {typ}"))
            .collect::<Vec<_>>()
            .join(", ");

        let pk_col = if add_pk_col {
            "id bigserial primary key, "
        } else {
            ""
        };

        let create_table_query = format!(
            "create table {} ({pk_col}{columns_str})",
            table.as_quoted_identifier(),
        );
        self.client
            .as_ref()
            .unwrap()
            .execute(&create_table_query, &[])
            .await?;

        Ok(())
    }

    /// Runs `alter table ... replica identity {value}` on the table.
    pub async fn alter_replica_identity(
        &self,
        table: &TableIdentifier,
        value: &str,
    ) -> Result<(), tokio_postgres::Error> {
        let query = format!(
            "alter table {} replica identity {value}",
            table.as_quoted_identifier()
        );
        self.client.as_ref().unwrap().execute(&query, &[]).await?;

        Ok(())
    }

    /// Returns the current replica identity of the table.
    pub async fn replica_identity(&self, table: &TableIdentifier) -> ReplicaIdentity {
        get_replica_identity(self.client.as_ref().unwrap(), table)
            .await
            .expect("Failed to read replica identity")
    }

    /// Creates a physical replication slot, which has neither a plugin nor a database.
    pub async fn create_physical_slot(&self, slot_name: &str) -> Result<(), tokio_postgres::Error> {
        self.client
            .as_ref()
            .unwrap()
            .execute(
                "select * from pg_create_physical_replication_slot($1)",
                &[&slot_name],
            )
            .await?;

        Ok(())
    }

    /// Checks whether a PostgreSQL replication slot exists.
    pub async fn replication_slot_exists(
        &self,
        slot_name: &str,
    ) -> Result<bool, tokio_postgres::Error> {
        let query = "select exists(select 1 from pg_replication_slots where slot_name = $1)";
        let row = self
            .client
            .as_ref()
            .unwrap()
            .query_one(query, &[&slot_name])
            .await?;

        Ok(row.get(0))
    }

    /// Returns `(plugin, database)` of a replication slot, if it exists.
    pub async fn replication_slot(
        &self,
        slot_name: &str,
    ) -> Result<Option<(Option<String>, Option<String>)>, tokio_postgres::Error> {
        let query = "select plugin::text, database::text from pg_replication_slots \
            where slot_name = $1";
        let row = self
            .client
            .as_ref()
            .unwrap()
            .query_opt(query, &[&slot_name])
            .await?;

        Ok(row.map(|row| (row.get(0), row.get(1))))
    }

    /// Executes arbitrary SQL on the database.
    pub async fn run_sql(&self, sql: &str) -> Result<u64, tokio_postgres::Error> {
        self.client.as_ref().unwrap().execute(sql, &[]).await
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        // To use `block_in_place,` we need a multithreaded runtime since when a blocking
        // task is issued, the runtime will offload existing tasks to another worker.
        tokio::task::block_in_place(move || {
            Handle::current()
                .block_on(async move { drop_pg_database(&self.config, &self.name).await });
        });
    }
}

/// Returns a random lowercase hex string usable in slot and database names.
pub fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Creates a new PostgreSQL database and returns a client connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &ProviderConfig, name: &str) -> Client {
    let client = connect_without_db(config).await;

    client
        .execute(
            &format!("create database {};", quote_identifier(name)),
            &[],
        )
        .await
        .expect("Failed to create database");

    connect_to_pg_database(config, name).await
}

/// Connects to an existing PostgreSQL database.
pub async fn connect_to_pg_database(config: &ProviderConfig, name: &str) -> Client {
    let (client, connection) = {
        let config: tokio_postgres::Config = config.with_db(name);
        config
            .connect(NoTls)
            .await
            .expect("Failed to connect to Postgres")
    };

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            info!("connection error: {e}");
        }
    });

    client
}

async fn connect_without_db(config: &ProviderConfig) -> Client {
    let (client, connection) = {
        let config: tokio_postgres::Config = config.without_db();
        config
            .connect(NoTls)
            .await
            .expect("Failed to connect to Postgres")
    };

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            info!("connection error: {e}");
        }
    });

    client
}

/// Drops a PostgreSQL database and cleans up all resources.
///
/// Terminates all active connections, drops the replication slots bound to the database,
/// and removes the database.
///
/// # Panics
/// Panics if any database operation fails.
pub async fn drop_pg_database(config: &ProviderConfig, name: &str) {
    let client = connect_without_db(config).await;

    // Forcefully terminate any remaining connections to the database
    client
        .execute(
            &format!(
                "select pg_terminate_backend(pg_stat_activity.pid) \
                from pg_stat_activity \
                where pg_stat_activity.datname = {} \
                and pid <> pg_backend_pid();",
                quote_literal(name)
            ),
            &[],
        )
        .await
        .expect("Failed to terminate database connections");

    // Logical slots keep the database in use, so they go first.
    client
        .execute(
            "select pg_drop_replication_slot(slot_name) from pg_replication_slots \
            where database = $1 and not active;",
            &[&name],
        )
        .await
        .expect("Failed to drop replication slots");

    client
        .execute(
            &format!("drop database if exists {};", quote_identifier(name)),
            &[],
        )
        .await
        .expect("Failed to destroy database");
}
