use pgrepl_config::load_config;
use pgrepl_config::shared::ProviderSettings;

/// Loads the [`ProviderSettings`] and validates them.
pub fn load_provider_settings() -> anyhow::Result<ProviderSettings> {
    let settings = load_config::<ProviderSettings>()?;
    settings.validate()?;

    Ok(settings)
}
