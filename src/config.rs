use std::path::Path;

use config_file::{ConfigFileError, FromConfigFile};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Handle each connection on its own thread instead of one at a time.
    #[serde(rename = "async")]
    pub concurrent: bool,
    /// Let every new effect cut the running one short (async mode only).
    pub preempt: bool,
    /// Driver program and arguments; `["-"]` writes frames to stdout.
    pub driver: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 3333,
            concurrent: false,
            preempt: false,
            driver: vec!["catlight".to_string(), "cat".to_string()],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigFileError> {
        let config = Config::from_config_file(path)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
