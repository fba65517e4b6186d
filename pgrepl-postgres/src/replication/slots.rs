use tokio_postgres::Client;
use tokio_postgres::error::SqlState;
use tracing::{info, warn};

/// Result of requesting the creation of a logical replication slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateSlotOutcome {
    /// The slot was created by this call.
    Created,
    /// A slot with the same name already existed.
    AlreadyExists,
}

/// Result of requesting a replication slot to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropSlotOutcome {
    /// The slot was dropped by this call.
    Dropped,
    /// No slot with the given name exists.
    NotFound,
}

/// A row of `pg_replication_slots`.
///
/// `plugin` and `database` are only null for physical slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot_name: String,
    pub plugin: Option<String>,
    pub database: Option<String>,
}

/// Creates a logical replication slot decoding through `output_plugin`.
///
/// The slot is bound to the database `client` is connected to. A slot that already
/// exists is reported as [`CreateSlotOutcome::AlreadyExists`] instead of an error.
pub async fn create_logical_slot(
    client: &Client,
    slot_name: &str,
    output_plugin: &str,
) -> Result<CreateSlotOutcome, tokio_postgres::Error> {
    let query = "select * from pg_create_logical_replication_slot($1, $2);";

    match client.execute(query, &[&slot_name, &output_plugin]).await {
        Ok(_) => {
            info!(slot_name, output_plugin, "created logical replication slot");

            Ok(CreateSlotOutcome::Created)
        }
        Err(err) if err.code() == Some(&SqlState::DUPLICATE_OBJECT) => {
            info!(slot_name, "logical replication slot already exists");

            Ok(CreateSlotOutcome::AlreadyExists)
        }
        Err(err) => Err(err),
    }
}

/// Looks up a replication slot by name.
///
/// Returns `None` if no slot with that name exists on the server.
pub async fn get_slot(
    client: &Client,
    slot_name: &str,
) -> Result<Option<SlotInfo>, tokio_postgres::Error> {
    let query = "select slot_name::text, plugin::text, database::text \
        from pg_replication_slots where slot_name = $1;";

    let row = client.query_opt(query, &[&slot_name]).await?;

    Ok(row.map(|row| SlotInfo {
        slot_name: row.get(0),
        plugin: row.get(1),
        database: row.get(2),
    }))
}

/// Drops a replication slot.
///
/// A slot that doesn't exist is reported as [`DropSlotOutcome::NotFound`]. Dropping a slot
/// which is still in use by a consumer fails with `object_in_use`.
pub async fn drop_slot(
    client: &Client,
    slot_name: &str,
) -> Result<DropSlotOutcome, tokio_postgres::Error> {
    let query = "select pg_drop_replication_slot($1);";

    match client.execute(query, &[&slot_name]).await {
        Ok(_) => {
            info!(slot_name, "dropped replication slot");

            Ok(DropSlotOutcome::Dropped)
        }
        Err(err) if err.code() == Some(&SqlState::UNDEFINED_OBJECT) => {
            warn!(slot_name, "attempted to drop non-existent replication slot");

            Ok(DropSlotOutcome::NotFound)
        }
        Err(err) => Err(err),
    }
}

/// Checks whether a replication slot with the given name exists.
pub async fn slot_exists(client: &Client, slot_name: &str) -> Result<bool, tokio_postgres::Error> {
    let query = "select exists(select 1 from pg_replication_slots where slot_name = $1);";
    let row = client.query_one(query, &[&slot_name]).await?;

    Ok(row.get(0))
}
