use pgrepl_config::shared::{
    DEFAULT_HOST, DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_SSL_MODE, DEFAULT_USER, PgSslMode,
    ProviderConfig, RetryConfig,
};
use tracing::{debug, info};

use crate::error::{ErrorKind, ProviderResult};
use crate::provider_error;
use crate::resources::{Resource, ReplicaIdentityResource, ReplicationSlotResource, ResourceType};
use crate::schema::{AttributeSchema, ProviderSchema, ResourceSchema};
use crate::state::ResourceData;

pub const HOST_ATTRIBUTE: &str = "host";
pub const PORT_ATTRIBUTE: &str = "port";
pub const SSLMODE_ATTRIBUTE: &str = "sslmode";
pub const USER_ATTRIBUTE: &str = "user";
pub const PASSWORD_ATTRIBUTE: &str = "password";
pub const TRUSTED_ROOT_CERTS_ATTRIBUTE: &str = "trusted_root_certs";

/// The configured provider.
///
/// Holds the immutable [`ProviderConfig`] and dispatches lifecycle operations to the
/// handler of the requested [`ResourceType`].
#[derive(Debug, Clone)]
pub struct Provider {
    config: ProviderConfig,
}

impl Provider {
    /// Creates a provider from an already validated configuration.
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Returns the schema of the provider configuration and of every resource type.
    pub fn schema() -> ProviderSchema {
        let mut schema = ProviderSchema::new()
            .with_attribute(
                HOST_ATTRIBUTE,
                AttributeSchema::optional_string("The server host to connect to.")
                    .with_default(DEFAULT_HOST),
            )
            .with_attribute(
                PORT_ATTRIBUTE,
                AttributeSchema::optional_int("The server port to connect to.")
                    .with_default(i64::from(DEFAULT_PORT)),
            )
            .with_attribute(
                SSLMODE_ATTRIBUTE,
                AttributeSchema::optional_string("The ssl mode to use.")
                    .with_default(DEFAULT_SSL_MODE.as_str()),
            )
            .with_attribute(
                USER_ATTRIBUTE,
                AttributeSchema::optional_string("The user to use to connect.")
                    .sensitive()
                    .with_default(DEFAULT_USER),
            )
            .with_attribute(
                PASSWORD_ATTRIBUTE,
                AttributeSchema::optional_string("The password to use to connect.")
                    .sensitive()
                    .with_default(DEFAULT_PASSWORD),
            )
            .with_attribute(
                TRUSTED_ROOT_CERTS_ATTRIBUTE,
                AttributeSchema::optional_string(
                    "PEM encoded root certificates used to verify the server.",
                ),
            );

        for resource_type in ResourceType::ALL {
            schema = schema.with_resource(resource_type.as_str(), resource_schema(resource_type));
        }

        schema
    }

    /// Builds a provider from host supplied configuration attributes.
    ///
    /// Missing attributes take their schema defaults. The resulting configuration is
    /// validated before the provider is returned.
    pub fn configure(data: &ResourceData) -> ProviderResult<Self> {
        let schema = Self::schema();
        let mut data = data.clone();
        schema.apply_defaults(&mut data);
        schema.validate(&data)?;

        let port = data.get_int(PORT_ATTRIBUTE).unwrap_or(i64::from(DEFAULT_PORT));
        let port = u16::try_from(port).map_err(|_| {
            provider_error!(
                ErrorKind::ConfigError,
                "Port is out of range",
                port
            )
        })?;
        let sslmode: PgSslMode = data.require_string(SSLMODE_ATTRIBUTE)?.parse()?;

        let config = ProviderConfig {
            host: data.require_string(HOST_ATTRIBUTE)?.to_owned(),
            port,
            user: data.require_string(USER_ATTRIBUTE)?.to_owned(),
            password: data.require_string(PASSWORD_ATTRIBUTE)?.into(),
            sslmode,
            trusted_root_certs: data
                .get_string(TRUSTED_ROOT_CERTS_ATTRIBUTE)
                .map(str::to_owned),
            retry: RetryConfig::default(),
        };
        config.validate()?;

        info!(
            host = %config.host,
            port = config.port,
            sslmode = %config.sslmode,
            "provider configured"
        );

        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Validates `data` against the resource schema and creates the resource.
    pub async fn create(
        &self,
        resource_type: ResourceType,
        data: &mut ResourceData,
    ) -> ProviderResult<()> {
        resource_schema(resource_type).validate(data)?;
        debug!(%resource_type, "creating resource");

        match resource_type {
            ResourceType::ReplicationSlot => {
                ReplicationSlotResource.create(&self.config, data).await
            }
            ResourceType::ReplicaIdentity => {
                ReplicaIdentityResource.create(&self.config, data).await
            }
        }
    }

    pub async fn read(
        &self,
        resource_type: ResourceType,
        data: &mut ResourceData,
    ) -> ProviderResult<()> {
        debug!(%resource_type, id = data.id(), "reading resource");

        match resource_type {
            ResourceType::ReplicationSlot => ReplicationSlotResource.read(&self.config, data).await,
            ResourceType::ReplicaIdentity => ReplicaIdentityResource.read(&self.config, data).await,
        }
    }

    pub async fn delete(
        &self,
        resource_type: ResourceType,
        data: &mut ResourceData,
    ) -> ProviderResult<()> {
        debug!(%resource_type, id = data.id(), "deleting resource");

        match resource_type {
            ResourceType::ReplicationSlot => {
                ReplicationSlotResource.delete(&self.config, data).await
            }
            ResourceType::ReplicaIdentity => {
                ReplicaIdentityResource.delete(&self.config, data).await
            }
        }
    }

    /// Imports the existing object identified by `id` and returns its state.
    pub async fn import(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> ProviderResult<ResourceData> {
        debug!(%resource_type, id, "importing resource");

        let mut data = ResourceData::new();
        data.set_id(id);

        match resource_type {
            ResourceType::ReplicationSlot => {
                ReplicationSlotResource.import(&self.config, &mut data).await?
            }
            ResourceType::ReplicaIdentity => {
                ReplicaIdentityResource.import(&self.config, &mut data).await?
            }
        }

        Ok(data)
    }
}

fn resource_schema(resource_type: ResourceType) -> ResourceSchema {
    match resource_type {
        ResourceType::ReplicationSlot => ReplicationSlotResource.schema(),
        ResourceType::ReplicaIdentity => ReplicaIdentityResource.schema(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn configure_applies_defaults() {
        let provider = Provider::configure(&ResourceData::new()).unwrap();
        let config = provider.config();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.user, "postgres");
        assert_eq!(config.password.expose_secret(), "postgres");
        assert_eq!(config.sslmode, PgSslMode::Prefer);
        assert_eq!(config.trusted_root_certs, None);
    }

    #[test]
    fn configure_reads_attributes() {
        let data = ResourceData::new()
            .with_attribute(HOST_ATTRIBUTE, "db.internal")
            .with_attribute(PORT_ATTRIBUTE, 6432_i64)
            .with_attribute(SSLMODE_ATTRIBUTE, "disable")
            .with_attribute(USER_ATTRIBUTE, "replicator");

        let provider = Provider::configure(&data).unwrap();
        let config = provider.config();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6432);
        assert_eq!(config.user, "replicator");
        assert_eq!(config.sslmode, PgSslMode::Disable);
    }

    #[test]
    fn configure_rejects_invalid_values() {
        let data = ResourceData::new().with_attribute(PORT_ATTRIBUTE, 70_000_i64);
        let err = Provider::configure(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let data = ResourceData::new().with_attribute(SSLMODE_ATTRIBUTE, "sometimes");
        let err = Provider::configure(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let data = ResourceData::new().with_attribute(SSLMODE_ATTRIBUTE, "verify-full");
        let err = Provider::configure(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let data = ResourceData::new().with_attribute(PORT_ATTRIBUTE, "5432");
        let err = Provider::configure(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn schema_lists_both_resources() {
        let schema = Provider::schema();

        assert_eq!(
            schema.resources.keys().copied().collect::<Vec<_>>(),
            vec![
                "postgresreplication_replica_identity",
                "postgresreplication_slot"
            ]
        );
        assert!(schema.attributes[USER_ATTRIBUTE].sensitive);
        assert!(schema.attributes[PASSWORD_ATTRIBUTE].sensitive);
        assert!(!schema.attributes[HOST_ATTRIBUTE].sensitive);
        assert_eq!(
            schema.attributes[PORT_ATTRIBUTE].default,
            Some(5432_i64.into())
        );
    }

    #[tokio::test]
    async fn create_validates_attributes_against_the_schema() {
        let provider = Provider::new(ProviderConfig::default());
        let mut data = ResourceData::new().with_attribute("table_name", "orders");

        let err = provider
            .create(ResourceType::ReplicaIdentity, &mut data)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.detail(), Some("database"));
    }
}
