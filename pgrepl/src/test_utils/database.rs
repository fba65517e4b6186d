use pgrepl_config::shared::{PgSslMode, ProviderConfig};
use pgrepl_postgres::identifier::TableIdentifier;
use pgrepl_postgres::tokio::test_utils::{PgDatabase, random_suffix};

use crate::resources::DATABASE_ATTRIBUTE;
use crate::resources::replica_identity::TABLE_NAME_ATTRIBUTE;
use crate::resources::slot::{OUTPUT_PLUGIN_ATTRIBUTE, SLOT_NAME_ATTRIBUTE};
use crate::state::ResourceData;

/// The schema name used for organizing test tables.
const TEST_DATABASE_SCHEMA: &str = "test";

/// Creates a [`TableIdentifier`] in the test schema.
pub fn test_table_name(name: &str) -> TableIdentifier {
    TableIdentifier {
        schema: Some(TEST_DATABASE_SCHEMA.to_owned()),
        name: name.to_owned(),
    }
}

/// Returns the [`ProviderConfig`] to connect to the local instance of Postgres.
///
/// If you fail to connect locally to the Postgres instance you can modify this
/// configuration with your parameters.
pub fn local_provider_config() -> ProviderConfig {
    ProviderConfig {
        host: "localhost".to_owned(),
        port: 5430,
        user: "postgres".to_owned(),
        password: "postgres".into(),
        sslmode: PgSslMode::Disable,
        ..ProviderConfig::default()
    }
}

/// Creates a new test database with a unique name and a `test` schema.
///
/// # Panics
///
/// Panics if the test schema cannot be created.
pub async fn spawn_source_database() -> PgDatabase {
    let database = PgDatabase::new(local_provider_config()).await;

    database
        .run_sql(&format!("create schema {TEST_DATABASE_SCHEMA}"))
        .await
        .expect("Failed to create test schema");

    database
}

/// Returns a unique slot name, slots being shared by every database of the cluster.
pub fn test_slot_name(prefix: &str) -> String {
    format!("{prefix}_{}", random_suffix())
}

/// Builds the attributes of a `postgresreplication_slot` resource.
pub fn slot_data(slot_name: &str, output_plugin: &str, database: &str) -> ResourceData {
    ResourceData::new()
        .with_attribute(SLOT_NAME_ATTRIBUTE, slot_name)
        .with_attribute(OUTPUT_PLUGIN_ATTRIBUTE, output_plugin)
        .with_attribute(DATABASE_ATTRIBUTE, database)
}

/// Builds the attributes of a `postgresreplication_replica_identity` resource.
pub fn replica_identity_data(table_name: &str, database: &str) -> ResourceData {
    ResourceData::new()
        .with_attribute(TABLE_NAME_ATTRIBUTE, table_name)
        .with_attribute(DATABASE_ATTRIBUTE, database)
}
