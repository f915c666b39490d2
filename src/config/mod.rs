mod settings;
mod validation;

pub use settings::{
    BlacklistSettings, CliOverrides, EnvOverrides, IndexerSettings, Settings, SettingsError,
};
pub use validation::{parse_blacklist, validate_settings, Blacklist};
