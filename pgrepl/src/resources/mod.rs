pub mod base;
pub mod replica_identity;
pub mod slot;

pub use base::{Resource, ResourceType};
pub use replica_identity::ReplicaIdentityResource;
pub use slot::ReplicationSlotResource;

use std::time::Duration;

use pgrepl_config::shared::ProviderConfig;
use pgrepl_postgres::connection::{PgConnection, connect};

use crate::error::ProviderResult;

/// Attribute holding the database a resource lives in.
pub const DATABASE_ATTRIBUTE: &str = "database";

/// Delete timeout applied when the host doesn't grant one.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens the connection used by a single resource operation.
async fn open_connection(config: &ProviderConfig, database: &str) -> ProviderResult<PgConnection> {
    let connection = connect(config, database).await?;

    Ok(connection)
}
