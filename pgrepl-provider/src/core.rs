use pgrepl::provider::Provider;
use pgrepl::state::ResourceData;
use pgrepl_config::shared::{ProviderConfig, RetryConfig};
use tracing::{debug, info};

use crate::cli::Command;
use crate::config::load_provider_settings;

/// Runs `command` and returns the JSON document to print.
pub async fn run_command(command: Command) -> anyhow::Result<String> {
    let output = match command {
        Command::Schema => serde_json::to_string_pretty(&Provider::schema())?,
        Command::Create(args) => {
            let provider = configured_provider()?;
            let mut data = args.resource_data();
            provider.create(args.resource_type, &mut data).await?;

            to_json(&data)?
        }
        Command::Read(args) => {
            let provider = configured_provider()?;
            let mut data = args.resource_data();
            provider.read(args.resource_type, &mut data).await?;

            to_json(&data)?
        }
        Command::Delete(args) => {
            let provider = configured_provider()?;
            let mut data = args.resource_data();
            provider.delete(args.resource_type, &mut data).await?;

            "{}".to_owned()
        }
        Command::Import(args) => {
            let provider = configured_provider()?;
            let data = provider.import(args.resource_type, &args.id).await?;

            to_json(&data)?
        }
    };

    Ok(output)
}

fn configured_provider() -> anyhow::Result<Provider> {
    let settings = load_provider_settings()?;
    log_config(&settings.provider);

    Ok(Provider::new(settings.provider))
}

fn to_json(data: &ResourceData) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn log_config(config: &ProviderConfig) {
    info!(
        host = config.host,
        port = config.port,
        user = config.user,
        sslmode = %config.sslmode,
        tls_root_certs = config.has_trusted_root_certs(),
        "provider connection config"
    );
    log_retry_config(&config.retry);
}

fn log_retry_config(config: &RetryConfig) {
    debug!(
        initial_delay_ms = config.initial_delay_ms,
        max_delay_ms = config.max_delay_ms,
        backoff_factor = config.backoff_factor,
        "retry config"
    );
}
