//! Layered CLI settings: defaults, then `freezefork.toml`, then `.env` and
//! the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use freezefork_core::{DEFAULT_HASH_WORKERS, DependencyGraphBuilder, IdentityComputer};
use freezefork_sync::GatewayConfig;
use freezefork_sync::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "freezefork.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub scan: ScanSettings,
    pub package: PackageSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Fold path case when deduplicating files (default: Windows only).
    pub case_insensitive: bool,
    pub hash_workers: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            case_insensitive: cfg!(windows),
            hash_workers: DEFAULT_HASH_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Commit author used when `--author` is not given.
    pub author: Option<String>,
}

impl Settings {
    /// Load settings for this process.
    ///
    /// An explicit `config` path must exist; the default file is optional.
    pub fn load(config: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match config {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings = toml::from_str(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Override fields from `FREEZEFORK_*` variables.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = var("FREEZEFORK_API_URL") {
            self.backend.base_url = url;
        }
        if let Some(secs) = var("FREEZEFORK_TIMEOUT_SECS") {
            self.backend.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("FREEZEFORK_TIMEOUT_SECS must be seconds, got {secs:?}"))?;
        }
        if let Some(author) = var("FREEZEFORK_AUTHOR") {
            self.package.author = Some(author);
        }
        if let Some(workers) = var("FREEZEFORK_HASH_WORKERS") {
            self.scan.hash_workers = workers.trim().parse().with_context(|| {
                format!("FREEZEFORK_HASH_WORKERS must be a number, got {workers:?}")
            })?;
        }
        Ok(())
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(self.backend.base_url.clone())
            .with_timeout(Duration::from_secs(self.backend.timeout_secs))
            .with_user_agent(self.backend.user_agent.clone())
    }

    pub fn builder(&self) -> DependencyGraphBuilder {
        DependencyGraphBuilder::new().case_insensitive(self.scan.case_insensitive)
    }

    pub fn identity(&self) -> IdentityComputer {
        IdentityComputer::with_workers(self.scan.hash_workers)
    }
}
