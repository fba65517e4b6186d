use pgrepl_config::shared::ProviderConfig;
use pgrepl_postgres::identifier::validate_slot_name;
use pgrepl_postgres::replication::slots::{
    CreateSlotOutcome, DropSlotOutcome, create_logical_slot, drop_slot, get_slot,
};
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::resources::base::Resource;
use crate::resources::{DATABASE_ATTRIBUTE, DEFAULT_DELETE_TIMEOUT, open_connection};
use crate::retry::{RetryError, retry_until};
use crate::schema::{AttributeSchema, ResourceSchema};
use crate::state::ResourceData;

pub const SLOT_NAME_ATTRIBUTE: &str = "slot_name";
pub const OUTPUT_PLUGIN_ATTRIBUTE: &str = "output_plugin";

/// `postgresreplication_slot`: a logical replication slot bound to an output plugin and a
/// database.
///
/// The identifier is the slot name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicationSlotResource;

impl Resource for ReplicationSlotResource {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(0)
            .with_attribute(
                SLOT_NAME_ATTRIBUTE,
                AttributeSchema::required_string(
                    "The name of the slot to create. Must be a valid replication slot name.",
                )
                .force_new(),
            )
            .with_attribute(
                OUTPUT_PLUGIN_ATTRIBUTE,
                AttributeSchema::required_string(
                    "The name of the output plugin used for logical decoding.",
                )
                .force_new(),
            )
            .with_attribute(
                DATABASE_ATTRIBUTE,
                AttributeSchema::required_string(
                    "The name of the database this slot is associated with.",
                )
                .force_new(),
            )
            .with_delete_timeout(DEFAULT_DELETE_TIMEOUT)
    }

    async fn create(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let slot_name = data.require_string(SLOT_NAME_ATTRIBUTE)?.to_owned();
        let output_plugin = data.require_string(OUTPUT_PLUGIN_ATTRIBUTE)?.to_owned();
        let database = data.require_string(DATABASE_ATTRIBUTE)?.to_owned();
        validate_slot_name(&slot_name)?;

        let connection = open_connection(config, &database).await?;
        let result = create_logical_slot(connection.client(), &slot_name, &output_plugin).await;
        connection.close().await;

        match result {
            Ok(CreateSlotOutcome::Created) => {}
            Ok(CreateSlotOutcome::AlreadyExists) => {
                info!(slot_name = %slot_name, "adopting existing replication slot");
            }
            Err(err) => {
                return Err(
                    ProviderError::from(err).with_description("Error creating replication slot")
                );
            }
        }

        data.set_id(slot_name);

        Ok(())
    }

    async fn read(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let Some(slot_name) = data.id().map(str::to_owned) else {
            bail!(ErrorKind::InvalidState, "Replication slot has no identifier");
        };
        let database = data
            .get_string(DATABASE_ATTRIBUTE)
            .unwrap_or_default()
            .to_owned();

        let connection = open_connection(config, &database).await?;
        let result = get_slot(connection.client(), &slot_name).await;
        connection.close().await;

        let slot = result.map_err(|err| {
            ProviderError::from(err)
                .with_description("Error while trying to read existing replication slot")
        })?;

        match slot {
            Some(slot) => {
                // Physical slots have neither a plugin nor a database.
                data.set(SLOT_NAME_ATTRIBUTE, slot.slot_name);
                data.set(OUTPUT_PLUGIN_ATTRIBUTE, slot.plugin.unwrap_or_default());
                data.set(DATABASE_ATTRIBUTE, slot.database.unwrap_or_default());
            }
            None => {
                warn!(slot_name = %slot_name, "replication slot not found, removing it from state");
                data.clear_id();
            }
        }

        Ok(())
    }

    async fn delete(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let slot_name = match data.get_string(SLOT_NAME_ATTRIBUTE).or(data.id()) {
            Some(slot_name) => slot_name.to_owned(),
            None => bail!(
                ErrorKind::ValidationError,
                "Missing required attribute",
                SLOT_NAME_ATTRIBUTE
            ),
        };
        let database = data
            .get_string(DATABASE_ATTRIBUTE)
            .unwrap_or_default()
            .to_owned();
        let timeout = data.delete_timeout(DEFAULT_DELETE_TIMEOUT);

        let slot_name = slot_name.as_str();
        let database = database.as_str();
        let outcome = retry_until(timeout, &config.retry, move || async move {
            let connection = match open_connection(config, database).await {
                Ok(connection) => connection,
                Err(err) => return Err(RetryError::Permanent(err)),
            };
            let result = drop_slot(connection.client(), slot_name).await;
            connection.close().await;

            result.map_err(|err| {
                RetryError::Retryable(
                    ProviderError::from(err).with_description("Error dropping replication slot"),
                )
            })
        })
        .await?;

        if outcome == DropSlotOutcome::NotFound {
            info!(slot_name, "replication slot was already gone");
        }

        data.clear_id();

        Ok(())
    }

    async fn import(&self, config: &ProviderConfig, data: &mut ResourceData) -> ProviderResult<()> {
        let Some(slot_name) = data.id().map(str::to_owned) else {
            bail!(ErrorKind::ValidationError, "Import requires a replication slot name");
        };
        validate_slot_name(&slot_name)?;

        self.read(config, data).await?;

        if data.id().is_none() {
            bail!(
                ErrorKind::ObjectNotFound,
                "Cannot import non-existent replication slot",
                slot_name
            );
        }

        Ok(())
    }
}
