//! Configuration for the graph façades
//!
//! Loaded from YAML; every field has a default so a partial file is valid.
//!
//! ```yaml
//! graph: social
//! max_depth: 8
//! strict_schema: true
//! log:
//!   level: debug
//!   ansi: false
//! ```

use crate::error::{OgmError, OgmResult};
use crate::query::ident::check_ident;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::Level;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum level: error, warn, info, debug or trace
    pub level: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn max_level(&self) -> OgmResult<Level> {
        Level::from_str(&self.level)
            .map_err(|_| OgmError::Config(format!("unknown log level `{}`", self.level)))
    }
}

/// Graph façade configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OgmConfig {
    /// AGE graph every statement runs against
    pub graph: String,
    /// Upper bound for expansion depth
    pub max_depth: u32,
    /// Reject labels that have no registered schema
    pub strict_schema: bool,
    pub log: LogConfig,
}

impl Default for OgmConfig {
    fn default() -> Self {
        Self {
            graph: "graph".to_string(),
            max_depth: 10,
            strict_schema: false,
            log: LogConfig::default(),
        }
    }
}

impl OgmConfig {
    /// Default configuration for a named graph
    pub fn for_graph(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> OgmResult<Self> {
        let config: OgmConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> OgmResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> OgmResult<()> {
        check_ident(&self.graph, "graph")?;
        if self.max_depth == 0 {
            return Err(OgmError::Config("max_depth must be at least 1".to_string()));
        }
        self.log.max_level()?;
        Ok(())
    }
}

/// Install a `tracing-subscriber` formatter for the configured level. Does
/// nothing if a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> OgmResult<()> {
    let level = config.max_level()?;
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(config.ansi)
        .try_init();
    Ok(())
}
