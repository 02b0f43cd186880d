//! CLI configuration.
//!
//! Read from `config.toml` in the platform config directory
//! (`~/.config/clash-reconcile/config.toml` on Linux) unless `--config`
//! points elsewhere. Command-line flags override every value here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::DocumentFormat;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Same format as the input.
    #[default]
    Auto,
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn resolve(self, input: DocumentFormat) -> DocumentFormat {
        match self {
            Self::Auto => input,
            Self::Yaml => DocumentFormat::Yaml,
            Self::Json => DocumentFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Profile label attached to diagnostics.
    pub profile: String,
    pub output_format: OutputFormat,
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
    /// Overwrite the input file instead of printing to stdout.
    pub in_place: bool,
    /// File these values were read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            output_format: OutputFormat::Auto,
            log_filter: "info".to_string(),
            in_place: false,
            source: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config TOML")
    }

    /// Default location of `config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "clash-reconcile")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config {}", path.display()))
            }
        };

        let mut config =
            Self::from_toml(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        config.source = Some(path);
        Ok(config)
    }
}
