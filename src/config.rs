use crate::error::{AdbError, Result};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5037;
pub const DEFAULT_BRIDGE_PORT: u16 = 6174;

/// Where and how to reach the ADB server.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    /// Binary spawned with `start-server` when the server refuses connections.
    pub bin: String,
    /// Idle read timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            bin: std::env::var("ADB_PATH").unwrap_or_else(|_| "adb".to_string()),
            timeout_ms: None,
        }
    }
}

impl ClientOptions {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = if host == "localhost" {
            DEFAULT_HOST.to_string()
        } else {
            host
        };
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_BRIDGE_PORT,
        }
    }
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub client: ClientOptions,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Config {
    pub fn load() -> Self {
        match Config::get_config_path() {
            Some(path) => Config::load_from_path(&path),
            None => {
                debug!("No home directory, using default config");
                Config::default()
            }
        }
    }

    /// Falls back to defaults when the file is missing or malformed.
    pub fn load_from_path(path: &Path) -> Self {
        debug!("Loading config from: {:?}", path);

        match fs::read_to_string(path) {
            Ok(content) => match Config::parse(&content) {
                Ok(config) => {
                    debug!("Parsed config: {:?}", config);
                    config
                }
                Err(e) => {
                    eprintln!("Error parsing config file: {}", e);
                    Config::default()
                }
            },
            Err(_) => {
                debug!("No config file found or unable to read it");
                Config::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AdbError::Config(e.to_string()))
    }

    fn get_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".adbridgeconfig"))
    }
}
