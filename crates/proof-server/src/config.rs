//! Server configuration from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use swap_circuits::{DEFAULT_HEIGHT, MAX_HEIGHT};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings of the proof server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Directory holding `spend.pk`, `spend.vk` and `spend.json`
    pub keys_dir: PathBuf,
    /// Directory of persisted tree records
    pub store_dir: PathBuf,
    /// Height of every tree served; also the circuit depth
    pub tree_height: usize,
    /// Number of recent roots treated as known by the root check
    pub root_window: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            keys_dir: PathBuf::from("keys"),
            store_dir: PathBuf::from("trees"),
            tree_height: DEFAULT_HEIGHT,
            root_window: 100,
        }
    }
}

impl ServerConfig {
    /// Read `SWAP_LISTEN_ADDR`, `SWAP_KEYS_DIR`, `SWAP_STORE_DIR`,
    /// `SWAP_TREE_HEIGHT` and `SWAP_ROOT_WINDOW`, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SWAP_LISTEN_ADDR") {
            config.listen_addr = value.parse().map_err(|_| ConfigError::Invalid {
                var: "SWAP_LISTEN_ADDR",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("SWAP_KEYS_DIR") {
            config.keys_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SWAP_STORE_DIR") {
            config.store_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SWAP_TREE_HEIGHT") {
            config.tree_height = value
                .parse()
                .ok()
                .filter(|h| (1..=MAX_HEIGHT).contains(h))
                .ok_or_else(|| ConfigError::Invalid {
                    var: "SWAP_TREE_HEIGHT",
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup("SWAP_ROOT_WINDOW") {
            config.root_window = value
                .parse()
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "SWAP_ROOT_WINDOW",
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }
}
