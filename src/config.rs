//! # Server and simulation configuration
//!
//! Loaded from a TOML file; every field has a default so an empty or
//! missing file yields a runnable server.
//!
//! ```toml
//! [server]
//! port = 26543
//! manufacturer_name = "SPECTARIS"
//!
//! [simulation]
//! update_interval_ms = 500
//! target_temperature = 37.0
//! controller_enabled = true
//! seed = 42
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DI_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/DI/";
pub const READER_NAMESPACE_URI: &str = "http://spectaris.de/LuminescenceReader/";

#[derive(Parser, Debug)]
#[command(name = "lads-reader-sim")]
#[command(about = "OPC UA sample server for a simulated LADS luminescence reader")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "lads-reader.toml")]
    pub config: PathBuf,

    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    pub manufacturer_name: String,
    pub software_version: String,
    pub pki_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 26543,
            application_name: "LADS LuminescenceReader".to_string(),
            application_uri: "LADS-SampleServer".to_string(),
            product_uri: "LADS-SampleServer".to_string(),
            manufacturer_name: "SPECTARIS".to_string(),
            software_version: "1.0.0".to_string(),
            pki_dir: PathBuf::from("./pki"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub update_interval_ms: u64,
    pub target_temperature: f64,
    pub controller_enabled: bool,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
            target_temperature: 37.0,
            controller_enabled: true,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.update_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "simulation.update_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !self.simulation.target_temperature.is_finite() {
            return Err(ConfigError::Invalid(
                "simulation.target_temperature must be finite".to_string(),
            ));
        }
        if self.server.application_uri.is_empty() {
            return Err(ConfigError::Invalid("server.application_uri is empty".to_string()));
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}
