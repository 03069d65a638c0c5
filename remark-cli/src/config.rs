use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use remark_core::{Command, Config};
use remark_dev_server::{DEFAULT_PORT, DevServerConfig};
use serde::{Deserialize, Serialize};

use crate::args::Invocation;

/// Everything the CLI needs, merged from defaults, the config file, the
/// environment and the command line.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RemarkConfig {
    /// Selected command; comes from the command line only
    #[serde(skip)]
    pub command: Command,
    /// Deck directories
    pub build: Config,
    /// Dev server settings
    pub dev: DevConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DevConfig {
    pub host: String,
    pub port: u16,
    pub open: bool,
    pub debounce_ms: u64,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            open: false,
            debounce_ms: 50,
        }
    }
}

impl RemarkConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (REMARK_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(invocation: &Invocation) -> Result<Self> {
        let config_file = invocation
            .value("config")
            .map(String::as_str)
            .unwrap_or("./remark.toml");

        let defaults = Self::default();
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&defaults)?)
            .add_source(File::from(Path::new(config_file)).required(false))
            .add_source(
                Environment::with_prefix("REMARK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, id) in [
            ("build.out_dir", "out"),
            ("build.slide_source", "source"),
            ("build.public_dir", "public"),
        ] {
            if let Some(value) = invocation.value(id) {
                builder = builder.set_override(key, value.as_str())?;
            }
        }
        if invocation.open() {
            builder = builder.set_override("dev.open", true)?;
        }

        let mut config: RemarkConfig = builder
            .build()
            .and_then(|merged| merged.try_deserialize())
            .with_context(|| format!("invalid configuration (file: {config_file})"))?;
        config.command = invocation.command;

        Ok(config)
    }

    pub fn dev_server_config(&self) -> DevServerConfig {
        DevServerConfig {
            host: self.dev.host.clone(),
            port: self.dev.port,
            site: self.build.clone(),
            open: self.dev.open,
            debounce: Duration::from_millis(self.dev.debounce_ms),
        }
    }
}
