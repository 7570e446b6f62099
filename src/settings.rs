use std::net::SocketAddr;

use serde::Deserialize;

use crate::signature::DEFAULT_ALGORITHM;
use crate::util::format_socket_address;

pub const DEFAULT_CONFIG_NAME: &str = "config/jsonapi";
pub const ENV_PREFIX: &str = "JSONAPI";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub signature: SignatureSettings,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SignatureSettings {
    /// Shared secret; there is no default, the server refuses to start without one.
    pub secret: String,
    pub algorithm: String,
    pub salt_required: bool,
    /// Maximum request age in seconds, 0 to accept any age.
    pub max_ttl: u64,
}

impl Settings {
    /// Layer defaults, the named config file and `JSONAPI_*` environment variables.
    ///
    /// Without a name the default file is optional; a named file must exist.
    /// Nested keys use a double underscore: `JSONAPI_SIGNATURE__SECRET`.
    pub fn load(config_name: Option<&str>) -> crate::Result<Settings> {
        let mut settings = config::Config::default();
        settings
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080i64)?
            .set_default("signature.secret", "")?
            .set_default("signature.algorithm", DEFAULT_ALGORITHM)?
            .set_default("signature.salt_required", true)?
            .set_default("signature.max_ttl", 300i64)?;

        match config_name {
            Some(name) => settings.merge(config::File::with_name(name))?,
            None => settings.merge(config::File::with_name(DEFAULT_CONFIG_NAME).required(false))?,
        };
        settings.merge(config::Environment::with_prefix(ENV_PREFIX).separator("__"))?;

        Ok(settings.try_into()?)
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format_socket_address(&self.host, self.port)
    }
}
