use pgrepl_config::shared::ProviderConfig;
use pgrepl_postgres::connection::current_database;
use pgrepl_postgres::identifier::TableIdentifier;
use pgrepl_postgres::replication::replica_identity::{
    ReplicaIdentity, get_replica_identity, set_replica_identity_full,
};
use tokio_postgres::Client;
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::resources::base::Resource;
use crate::resources::{DATABASE_ATTRIBUTE, DEFAULT_DELETE_TIMEOUT, open_connection};
use crate::schema::{AttributeSchema, ResourceSchema};
use crate::state::ResourceData;

pub const TABLE_NAME_ATTRIBUTE: &str = "table_name";

/// `postgresreplication_replica_identity`: keeps the replica identity of a table at `FULL`.
///
/// The identifier is the table name. Deleting the resource leaves the table untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaIdentityResource;

impl Resource for ReplicaIdentityResource {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(0)
            .with_attribute(
                TABLE_NAME_ATTRIBUTE,
                AttributeSchema::required_string(
                    "The name of the table you want to alter replication identity to full",
                )
                .force_new(),
            )
            .with_attribute(
                DATABASE_ATTRIBUTE,
                AttributeSchema::required_string("The database where the table resides")
                    .force_new(),
            )
            .with_delete_timeout(DEFAULT_DELETE_TIMEOUT)
    }

    async fn create(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let table_name = data.require_string(TABLE_NAME_ATTRIBUTE)?.to_owned();
        let database = data.require_string(DATABASE_ATTRIBUTE)?.to_owned();
        let table = TableIdentifier::parse(&table_name)?;

        let connection = open_connection(config, &database).await?;
        let result = ensure_replica_identity_full(connection.client(), &table).await;
        connection.close().await;
        result?;

        data.set_id(table_name);

        Ok(())
    }

    async fn read(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let table_name = match data.get_string(TABLE_NAME_ATTRIBUTE).or(data.id()) {
            Some(table_name) => table_name.to_owned(),
            None => bail!(
                ErrorKind::ValidationError,
                "Missing required attribute",
                TABLE_NAME_ATTRIBUTE
            ),
        };
        let database = data
            .get_string(DATABASE_ATTRIBUTE)
            .unwrap_or_default()
            .to_owned();
        let table = TableIdentifier::parse(&table_name)?;

        let connection = open_connection(config, &database).await?;
        let result = get_replica_identity(connection.client(), &table).await;
        connection.close().await;

        let identity = result.map_err(|err| {
            ProviderError::from(err).with_description("Unable to read replica identity")
        })?;
        if identity != ReplicaIdentity::Full {
            warn!(table = %table, %identity, "replica identity is no longer full");
        }

        Ok(())
    }

    async fn delete(&self, _config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        info!(
            table_name = data.get_string(TABLE_NAME_ATTRIBUTE).unwrap_or_default(),
            "leaving replica identity unchanged"
        );
        data.clear_id();

        Ok(())
    }

    async fn import(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let Some(id) = data.id().map(str::to_owned) else {
            bail!(ErrorKind::ValidationError, "Import requires a table name");
        };
        let (database, table_name) = split_import_id(&id);
        let table = TableIdentifier::parse(table_name)?;

        let connection = open_connection(config, database.unwrap_or_default()).await?;
        let result = read_import_state(connection.client(), &table).await;
        connection.close().await;
        let (identity, current_database) = result?;

        if identity != ReplicaIdentity::Full {
            bail!(
                ErrorKind::InvalidState,
                "Cannot import table whose replica identity is not full",
                format!("replica identity of {table} is {identity}")
            );
        }

        data.set(TABLE_NAME_ATTRIBUTE, table_name);
        data.set(DATABASE_ATTRIBUTE, current_database);
        data.set_id(table_name);

        Ok(())
    }
}

/// Sets the replica identity of `table` to full unless it already is.
async fn ensure_replica_identity_full(client: &Client, table: &TableIdentifier) -> ProviderResult<()> {
    let identity = get_replica_identity(client, table).await.map_err(|err| {
        ProviderError::from(err).with_description("Error checking replica identity status")
    })?;

    if identity == ReplicaIdentity::Full {
        info!(table = %table, "replica identity is already full");

        return Ok(());
    }

    set_replica_identity_full(client, table)
        .await
        .map_err(|err| ProviderError::from(err).with_description("Error altering table"))
}

async fn read_import_state(
    client: &Client,
    table: &TableIdentifier,
) -> ProviderResult<(ReplicaIdentity, String)> {
    let identity = get_replica_identity(client, table).await.map_err(|err| {
        ProviderError::from(err).with_description("Unable to read replica identity")
    })?;
    let database = current_database(client).await?;

    Ok((identity, database))
}

/// Splits an import id of the form `<database>/<table_name>` or `<table_name>`.
///
/// A quoted table name may contain `/`, so ids starting with `"` are taken as a table
/// name only.
fn split_import_id(id: &str) -> (Option<&str>, &str) {
    if id.starts_with('"') {
        return (None, id);
    }

    match id.split_once('/') {
        Some((database, table_name)) => (Some(database), table_name),
        None => (None, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_from_import_id() {
        assert_eq!(split_import_id("app/public.orders"), (Some("app"), "public.orders"));
        assert_eq!(split_import_id("orders"), (None, "orders"));
        assert_eq!(split_import_id(r#""a/b""#), (None, r#""a/b""#));
    }

    #[test]
    fn schema_requires_force_new_attributes() {
        let schema = ReplicaIdentityResource.schema();

        assert_eq!(schema.attributes.len(), 2);
        assert!(
            schema
                .attributes
                .values()
                .all(|attribute| attribute.required && attribute.force_new)
        );
        assert_eq!(schema.timeouts.delete, Some(DEFAULT_DELETE_TIMEOUT));
    }
}
