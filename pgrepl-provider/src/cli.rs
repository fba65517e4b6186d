use std::time::Duration;

use clap::{Parser, Subcommand};
use pgrepl::resources::ResourceType;
use pgrepl::state::ResourceData;

/// Manages PostgreSQL logical replication slots and replica identities.
///
/// Connection settings are read from `configuration/{base,<environment>}.yaml` and from
/// `APP_PROVIDER__*` environment variables.
#[derive(Debug, Parser)]
#[command(name = "pgrepl-provider", version, about, arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the provider schema as JSON
    Schema,
    /// Create a resource and print its state
    Create(ResourceArgs),
    /// Refresh a resource from the database and print its state
    Read(ResourceArgs),
    /// Delete a resource
    Delete(ResourceArgs),
    /// Import an existing slot or table and print its state
    Import(ImportArgs),
}

#[derive(Debug, clap::Args)]
pub struct ResourceArgs {
    /// Resource type, e.g. `postgresreplication_slot`
    #[arg(long = "type", value_parser = parse_resource_type)]
    pub resource_type: ResourceType,

    /// Identifier of an existing resource
    #[arg(long)]
    pub id: Option<String>,

    /// Resource attribute as `key=value`, may be repeated
    #[arg(long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, String)>,

    /// Time allowed for a delete, including retries
    #[arg(long)]
    pub delete_timeout_secs: Option<u64>,
}

impl ResourceArgs {
    /// Builds the [`ResourceData`] handed to the resource handler.
    pub fn resource_data(&self) -> ResourceData {
        let mut data = ResourceData::from_attributes(self.attributes.iter().cloned());

        if let Some(id) = &self.id {
            data.set_id(id.as_str());
        }
        if let Some(secs) = self.delete_timeout_secs {
            data.set_delete_timeout(Duration::from_secs(secs));
        }

        data
    }
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// Resource type, e.g. `postgresreplication_replica_identity`
    #[arg(long = "type", value_parser = parse_resource_type)]
    pub resource_type: ResourceType,

    /// Slot name, or table name optionally prefixed with `<database>/`
    pub id: String,
}

fn parse_resource_type(value: &str) -> Result<ResourceType, String> {
    value.parse().map_err(|_| {
        let known = ResourceType::ALL.map(|resource_type| resource_type.as_str());
        format!("expected one of: {}", known.join(", "))
    })
}

fn parse_attribute(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("`{value}` is not of the form key=value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_arguments() {
        let args = Args::try_parse_from([
            "pgrepl-provider",
            "create",
            "--type",
            "postgresreplication_slot",
            "--attr",
            "slot_name=orders_slot",
            "--attr",
            "output_plugin=test_decoding",
            "--attr",
            "database=app",
        ])
        .unwrap();

        let Command::Create(args) = args.command else {
            panic!("expected the create command");
        };
        assert_eq!(args.resource_type, ResourceType::ReplicationSlot);

        let data = args.resource_data();
        assert_eq!(data.id(), None);
        assert_eq!(data.get_string("slot_name"), Some("orders_slot"));
        assert_eq!(data.get_string("output_plugin"), Some("test_decoding"));
        assert_eq!(data.get_string("database"), Some("app"));
    }

    #[test]
    fn parses_delete_timeout_and_id() {
        let args = Args::try_parse_from([
            "pgrepl-provider",
            "delete",
            "--type",
            "postgresreplication_slot",
            "--id",
            "orders_slot",
            "--delete-timeout-secs",
            "5",
        ])
        .unwrap();

        let Command::Delete(args) = args.command else {
            panic!("expected the delete command");
        };

        let data = args.resource_data();
        assert_eq!(data.id(), Some("orders_slot"));
        assert_eq!(
            data.delete_timeout(Duration::from_secs(60)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn parses_import_arguments() {
        let args = Args::try_parse_from([
            "pgrepl-provider",
            "import",
            "--type",
            "postgresreplication_replica_identity",
            "app/public.orders",
        ])
        .unwrap();

        let Command::Import(args) = args.command else {
            panic!("expected the import command");
        };
        assert_eq!(args.resource_type, ResourceType::ReplicaIdentity);
        assert_eq!(args.id, "app/public.orders");
    }

    #[test]
    fn attribute_values_may_contain_equal_signs() {
        assert_eq!(
            parse_attribute("table_name=a=b").unwrap(),
            ("table_name".to_owned(), "a=b".to_owned())
        );
        assert!(parse_attribute("table_name").is_err());
        assert!(parse_attribute("=orders").is_err());
    }

    #[test]
    fn rejects_unknown_resource_types() {
        let result = Args::try_parse_from([
            "pgrepl-provider",
            "read",
            "--type",
            "postgresreplication_publication",
        ]);

        assert!(result.is_err());
    }
}
