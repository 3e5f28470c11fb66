//! haab.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level daemon configuration, loaded from `haab.toml`.
///
/// Every section is optional in the file; missing values fall back to the
/// defaults below so a bare `haabd` invocation works without any file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HaabConfig {
    pub server: ServerConfig,
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the HTTP API listens on.
    pub port: u16,
    /// Data directory for the application record store.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Port inside the container that gets published to the host.
    pub container_port: u16,
    /// Seconds to wait for a container to stop before it is killed.
    pub stop_timeout_secs: u32,
    /// Number of backlog lines replayed when a log stream starts.
    pub log_tail: u32,
}

impl Default for HaabConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            docker: DockerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/haab"),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            container_port: 80,
            stop_timeout_secs: 10,
            log_tail: 100,
        }
    }
}

impl HaabConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HaabConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the given path if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = HaabConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.docker.container_port, 80);
        assert_eq!(config.docker.log_tail, 100);
    }

    #[test]
    fn parses_partial_file() {
        let toml_str = r#"
[server]
port = 9000

[docker]
container_port = 3000
"#;
        let config: HaabConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.docker.container_port, 3000);
        // Unspecified fields keep their defaults.
        assert_eq!(config.docker.stop_timeout_secs, 10);
    }

    #[test]
    fn parses_empty_file() {
        let config: HaabConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
