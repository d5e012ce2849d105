//! Attester configuration
//!
//! The Issuer is named per request (`?issuer=`), so the file only carries
//! how to reach Issuers, not which one.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Default config filename when neither `--config` nor CONFIG_PATH is set.
pub const DEFAULT_CONFIG_FILE: &str = "privacypass-attester.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub issuer: IssuerConfig,
}

/// Listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// How forwarded token requests reach the Issuer
#[derive(Debug, Deserialize)]
pub struct IssuerConfig {
    /// URL scheme used to build `<scheme>://<issuer>/token-request`
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_scheme() -> String {
    "https".into()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let config: Config = common::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.issuer.scheme != "http" && self.issuer.scheme != "https" {
            return Err(common::Error::Config(format!(
                "issuer.scheme must be http or https, got: {}",
                self.issuer.scheme
            )));
        }
        if self.issuer.timeout_secs == 0 {
            return Err(common::Error::Config(
                "issuer.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
