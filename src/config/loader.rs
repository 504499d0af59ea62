//! Configuration loading with multi-layer merge

use super::PipelineConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level docpipe configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DocpipeConfig {
    /// Manager endpoints and polling
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Document store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Pipeline shape; the built-in default applies when absent
    pub pipeline: Option<PipelineConfig>,
}

/// Endpoints of the external job manager
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Host of the request/reply submission endpoint
    #[serde(default = "default_host")]
    pub api_host: String,

    /// Port of the request/reply submission endpoint
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Host of the broadcast subscription endpoint
    #[serde(default = "default_host")]
    pub broadcast_host: String,

    /// Port of the broadcast subscription endpoint
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,

    /// Bound on one broadcast poll, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_api_port() -> u16 {
    5555
}

fn default_broadcast_port() -> u16 {
    5556
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            api_host: default_host(),
            api_port: default_api_port(),
            broadcast_host: default_host(),
            broadcast_port: default_broadcast_port(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ManagerConfig {
    /// Address of the request/reply endpoint
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Address of the broadcast endpoint
    pub fn broadcast_addr(&self) -> String {
        format!("{}:{}", self.broadcast_host, self.broadcast_port)
    }

    /// Broadcast poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Document store settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database path; defaults to ~/.config/docpipe/documents.db
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the database path, creating the parent directory if needed
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.path {
            return Ok(path.clone());
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        let store_dir = config_dir.join("docpipe");
        std::fs::create_dir_all(&store_dir)
            .with_context(|| format!("Failed to create store directory at {}", store_dir.display()))?;

        Ok(store_dir.join("documents.db"))
    }
}

impl DocpipeConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/docpipe/config.toml
    /// 3. .docpipe/config.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                let user_config = Self::load_file(&user_config_path)
                    .with_context(|| format!("loading {}", user_config_path.display()))?;
                config.merge(user_config);
            }
        }

        let project_config_path = project_dir
            .map(|p| p.join(".docpipe/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".docpipe/config.toml"));

        if project_config_path.exists() {
            let project_config = Self::load_file(&project_config_path)
                .with_context(|| format!("loading {}", project_config_path.display()))?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Get the user config path (~/.config/docpipe/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docpipe/config.toml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.manager.api_host != default_host() {
            self.manager.api_host = other.manager.api_host;
        }
        if other.manager.api_port != default_api_port() {
            self.manager.api_port = other.manager.api_port;
        }
        if other.manager.broadcast_host != default_host() {
            self.manager.broadcast_host = other.manager.broadcast_host;
        }
        if other.manager.broadcast_port != default_broadcast_port() {
            self.manager.broadcast_port = other.manager.broadcast_port;
        }
        if other.manager.poll_interval_ms != default_poll_interval_ms() {
            self.manager.poll_interval_ms = other.manager.poll_interval_ms;
        }

        if other.store.path.is_some() {
            self.store.path = other.store.path;
        }

        if other.pipeline.is_some() {
            self.pipeline = other.pipeline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DocpipeConfig::default();
        assert_eq!(config.manager.api_addr(), "localhost:5555");
        assert_eq!(config.manager.broadcast_addr(), "localhost:5556");
        assert_eq!(config.manager.poll_interval(), Duration::from_millis(100));
        assert!(config.pipeline.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            [manager]
            api_host = "pipeline.internal"
            api_port = 6000
            poll_interval_ms = 250

            [store]
            path = "/tmp/docs.db"
        "#
        )
        .unwrap();

        let config = DocpipeConfig::load_file(&config_path).unwrap();
        assert_eq!(config.manager.api_addr(), "pipeline.internal:6000");
        // Unset fields keep their defaults
        assert_eq!(config.manager.broadcast_addr(), "localhost:5556");
        assert_eq!(config.manager.poll_interval_ms, 250);
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/docs.db")));
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[manager]\nhostname = \"x\"\n").unwrap();

        assert!(DocpipeConfig::load_file(&config_path).is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base = DocpipeConfig::default();
        base.manager.api_port = 7000;

        let mut override_config = DocpipeConfig::default();
        override_config.manager.broadcast_port = 7001;
        override_config.store.path = Some(PathBuf::from("/tmp/override.db"));

        base.merge(override_config);

        // Fields left at their default in the override do not clobber
        assert_eq!(base.manager.api_port, 7000);
        assert_eq!(base.manager.broadcast_port, 7001);
        assert_eq!(base.store.path, Some(PathBuf::from("/tmp/override.db")));
    }

    #[test]
    fn test_explicit_store_path_is_used_verbatim() {
        let config = StoreConfig {
            path: Some(PathBuf::from("/tmp/explicit.db")),
        };
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/explicit.db"));
    }
}
