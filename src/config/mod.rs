//! The `config` module loads the bridge settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file (`config/default.{toml,yaml,json}` unless another path is given) and
//! `BRIDGE__<SECTION>__<KEY>` environment variables.

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    HealthSettings, IngressSettings, KafkaSettings, MqttSettings, RuntimeSettings, Settings,
    SettingsError,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/default";
pub const ENV_PREFIX: &str = "BRIDGE";

/// Loads the configuration from `path` (extension optional, file optional)
/// and environment variables, then merges it over the defaults.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_over(Settings::default()))
}

#[cfg(test)]
mod tests;
