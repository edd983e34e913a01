use std::{
    convert::{TryFrom, TryInto},
    path::{Path, PathBuf},
};

use serde_aux::field_attributes::deserialize_number_from_string;
use taskdeck_shared::{const_config::client::CLIENT_DEFAULT_ENDPOINT, time::Seconds};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Configuration {
    pub session: ClientSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ClientSettings {
    /// URL of the GraphQL endpoint every operation is posted to
    pub endpoint: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub access_token_lifetime_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub refresh_token_lifetime_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub refresh_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub permission_timeout_secs: u64,
    /// If set tokens are also kept in this file so they survive a restart
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl ClientSettings {
    pub fn access_lifetime(&self) -> Seconds {
        self.access_token_lifetime_secs.into()
    }

    pub fn refresh_lifetime(&self) -> Seconds {
        self.refresh_token_lifetime_secs.into()
    }

    pub fn refresh_timeout(&self) -> Seconds {
        self.refresh_timeout_secs.into()
    }

    pub fn permission_timeout(&self) -> Seconds {
        self.permission_timeout_secs.into()
    }
}

/// Reads the configuration from the `configuration` folder under the current
/// directory
pub fn get_configuration() -> Result<Configuration, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("failed to determine the current directory: {e}"))
    })?;
    get_configuration_from(&base_path.join("configuration"))
}

/// Layers `base.toml`, then `{environment}.toml`, then `APP_` environment
/// variables. E.g. `APP_SESSION__ENDPOINT=http://x/graphql` sets
/// `Configuration.session.endpoint`
pub fn get_configuration_from(
    configuration_directory: &Path,
) -> Result<Configuration, config::ConfigError> {
    // Default to `local` if unspecified
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.toml", environment.as_str());
    let settings = config::Config::builder()
        .set_default("session.endpoint", CLIENT_DEFAULT_ENDPOINT)?
        .add_source(config::File::from(
            configuration_directory.join("base.toml"),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Configuration>()
}

/// The possible runtime environment for our application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}
