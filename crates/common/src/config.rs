//! Config file discovery and loading shared by both services
//!
//! Config precedence: `--config` CLI flag > `CONFIG_PATH` env var > a
//! per-service default filename in the working directory.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extract the value following a `--config` flag from the process arguments.
pub fn cli_config_arg() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Resolve config file path from CLI arg or CONFIG_PATH env var.
pub fn resolve_path(cli_path: Option<&str>, default_file: &str) -> PathBuf {
    if let Some(p) = cli_path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var("CONFIG_PATH") {
        return PathBuf::from(p);
    }
    PathBuf::from(default_file)
}

/// Read and deserialize a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject anything that is not an absolute http(s) URL.
pub fn require_http_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}
