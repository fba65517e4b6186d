use std::fmt;
use std::future::Future;
use std::str::FromStr;

use pgrepl_config::shared::ProviderConfig;

use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::provider_error;
use crate::schema::ResourceSchema;
use crate::state::ResourceData;

/// Lifecycle handlers of a resource type.
///
/// Every handler opens its own connection from `config` and closes it before returning.
/// Handlers read their inputs from `data` and write the observed state back into it.
pub trait Resource {
    /// Returns the declarative schema of the resource type.
    fn schema(&self) -> ResourceSchema;

    /// Creates the resource and sets its identifier.
    fn create(
        &self,
        config: &ProviderConfig,
        data: &mut ResourceData,
    ) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Refreshes `data` from the database.
    ///
    /// A resource that no longer exists has its identifier cleared.
    fn read(
        &self,
        config: &ProviderConfig,
        data: &mut ResourceData,
    ) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Removes the database object, or leaves it untouched, and clears the identifier.
    fn delete(
        &self,
        config: &ProviderConfig,
        data: &mut ResourceData,
    ) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Populates `data` from an existing database object named by the identifier in `data`.
    fn import(
        &self,
        config: &ProviderConfig,
        data: &mut ResourceData,
    ) -> impl Future<Output = ProviderResult<()>> + Send;
}

/// Resource types served by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    ReplicationSlot,
    ReplicaIdentity,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [ResourceType::ReplicationSlot, ResourceType::ReplicaIdentity];

    /// Returns the type name hosts use to refer to the resource type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::ReplicationSlot => "postgresreplication_slot",
            ResourceType::ReplicaIdentity => "postgresreplication_replica_identity",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|resource_type| resource_type.as_str() == s)
            .ok_or_else(|| {
                provider_error!(
                    ErrorKind::UnknownResourceType,
                    "Unknown resource type",
                    s
                )
            })
    }
}
