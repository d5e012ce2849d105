//! Origin configuration

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Default config filename when neither `--config` nor CONFIG_PATH is set.
pub const DEFAULT_CONFIG_FILE: &str = "privacypass-origin.toml";

/// Resource served to clients after a successful redemption.
pub const DEFAULT_RESOURCE_URL: &str =
    "https://tfpauly.github.io/privacy-proxy/draft-privacypass-rate-limit-tokens.html";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub issuer: IssuerConfig,
    pub origin: OriginConfig,
}

/// Listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// The Issuer whose keys this Origin trusts
#[derive(Debug, Deserialize)]
pub struct IssuerConfig {
    /// Issuer name, placed in every challenge and used to reach its directory
    pub name: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// What the Origin puts in its challenges and serves on success
#[derive(Debug, Deserialize)]
pub struct OriginConfig {
    pub name: String,
    /// Extra names appended after `name` in the challenge origin info
    #[serde(default)]
    pub origin_info: Vec<String>,
    #[serde(default = "default_resource_url")]
    pub resource_url: String,
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

fn default_resource_url() -> String {
    DEFAULT_RESOURCE_URL.into()
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let config: Config = common::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.issuer.name.trim().is_empty() {
            return Err(common::Error::Config("issuer.name must not be empty".into()));
        }
        if self.origin.name.trim().is_empty() {
            return Err(common::Error::Config("origin.name must not be empty".into()));
        }
        // Challenge origin info is a comma-joined list.
        if self.origin.name.contains(',') {
            return Err(common::Error::Config("origin.name must not contain ','".into()));
        }
        if let Some(name) = self.origin.origin_info.iter().find(|n| n.contains(',')) {
            return Err(common::Error::Config(format!(
                "origin.origin_info entries must not contain ',', got: {name}"
            )));
        }
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
        common::require_http_url("origin.resource_url", &self.origin.resource_url)?;
        Ok(())
    }
}
