use std::path::Path;

use serde::de::DeserializeOwned;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_PROVIDER__HOST` sets the `provider.host` field.
const ENV_SEPARATOR: &str = "__";

/// Loads hierarchical configuration from the `configuration` directory under the
/// current working directory.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(|err| {
        config::ConfigError::Message(format!("failed to determine the current directory: {err}"))
    })?;

    load_config_from(&base_path.join(CONFIGURATION_DIR))
}

/// Loads hierarchical configuration from YAML files and environment variables.
///
/// Sources are layered in this order, later sources overriding earlier ones:
/// 1. `{dir}/base.yaml`
/// 2. `{dir}/{environment}.yaml`
/// 3. Environment variables prefixed with `APP`
///
/// Both files are optional. A provider started without any configuration file
/// falls back to the defaults of the deserialized type.
pub fn load_config_from<T>(configuration_directory: &Path) -> Result<T, config::ConfigError>
where
    T: DeserializeOwned,
{
    let environment = Environment::load().map_err(|err| {
        config::ConfigError::Message(format!("failed to parse APP_ENVIRONMENT: {err}"))
    })?;

    let environment_filename = format!("{environment}.yaml");

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    let settings = config::Config::builder()
        .add_source(
            config::File::from(configuration_directory.join(BASE_CONFIG_FILE)).required(false),
        )
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        // E.g. `APP_PROVIDER__SSLMODE=disable` sets `provider.sslmode`.
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}
