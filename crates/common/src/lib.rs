//! Common types for the Privacy Pass services

mod config;
mod error;
mod logging;

pub use config::{cli_config_arg, load_toml, require_http_url, resolve_path};
pub use error::{Error, Result};
pub use logging::init_tracing;
