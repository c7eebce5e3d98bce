//! Node configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete node configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub services: ServicesSection,

    #[serde(default)]
    pub tickets: TicketsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeSection {
    /// Node identifier, appended to issued ticket ids. Generated when empty.
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Registry backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Memory,
    Sled,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrySection {
    /// Seed the registry from JSON definitions at startup
    #[serde(default)]
    pub init_from_json: bool,
    #[serde(default = "default_json_location")]
    pub json_location: PathBuf,
    #[serde(default = "default_backend")]
    pub backend: RegistryBackend,
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesSection {
    #[serde(default = "default_lookup_capacity")]
    pub lookup_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketsSection {
    /// Lifetime of transient session tickets
    #[serde(default = "default_time_to_kill")]
    pub transient_time_to_kill_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

// Default value functions
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }
fn default_log_level() -> String { "info".to_string() }
fn default_json_location() -> PathBuf { PathBuf::from("./services") }
fn default_backend() -> RegistryBackend { RegistryBackend::Sled }
fn default_registry_path() -> PathBuf { PathBuf::from("registry") }
fn default_lookup_capacity() -> usize { 10_000 }
fn default_time_to_kill() -> u64 { 300 }
fn default_sweep_interval() -> u64 { 60 }

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            init_from_json: false,
            json_location: default_json_location(),
            backend: default_backend(),
            path: default_registry_path(),
            database_url: None,
        }
    }
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            lookup_capacity: default_lookup_capacity(),
        }
    }
}

impl Default for TicketsSection {
    fn default() -> Self {
        Self {
            transient_time_to_kill_secs: default_time_to_kill(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSection::default(),
            registry: RegistrySection::default(),
            services: ServicesSection::default(),
            tickets: TicketsSection::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {:?}", path.as_ref()))?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration file")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry.backend == RegistryBackend::Postgres {
            if self.registry.database_url.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("Registry backend 'postgres' requires 'database_url'");
            }
            if !cfg!(feature = "postgres") {
                anyhow::bail!("Registry backend 'postgres' requires building with the 'postgres' feature");
            }
        }

        if self.services.lookup_capacity == 0 {
            anyhow::bail!("Service lookup capacity must be greater than 0");
        }

        if self.tickets.transient_time_to_kill_secs == 0 {
            anyhow::bail!("Transient ticket time to kill must be greater than 0");
        }

        if self.tickets.sweep_interval_secs == 0 {
            anyhow::bail!("Ticket sweep interval must be greater than 0");
        }

        Ok(())
    }

    /// Get absolute data directory path
    pub fn data_dir(&self) -> PathBuf {
        if self.node.data_dir.is_absolute() {
            self.node.data_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.node.data_dir)
        }
    }

    /// Get absolute sled registry path
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            self.data_dir().join(&self.registry.path)
        }
    }

    pub fn transient_time_to_kill(&self) -> Duration {
        Duration::from_secs(self.tickets.transient_time_to_kill_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.tickets.sweep_interval_secs)
    }
}
