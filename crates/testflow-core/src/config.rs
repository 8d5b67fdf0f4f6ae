//! Configuration schema and loader.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub artifacts: ArtifactsConfig,
    pub agent: AgentConfig,
    pub browser: BrowserConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When true, error responses carry only a generic message.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            production: false,
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.testflow/testflow.db".to_string(),
        }
    }
}

/// Artifact storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory for screenshots and reports.
    pub dir: String,
}

impl ArtifactsConfig {
    /// Expanded artifacts directory.
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.dir))
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "~/.testflow/artifacts".to_string(),
        }
    }
}

/// Planning-agent endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the planning agent, e.g. "http://localhost:8700".
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Upper bound on actions executed for one task.
    pub max_actions: usize,
    /// Request timeout for one planning call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8700".to_string(),
            api_key: None,
            max_actions: 25,
            timeout_seconds: 60,
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit path to a Chromium/Chrome binary. Falls back to
    /// `TESTFLOW_CHROME` and then well-known install locations.
    pub binary: Option<String>,
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }
        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.testflow`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.agent.max_actions, 25);
        assert!(!config.server.production);
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 4000

            [agent]
            endpoint = "http://agent.internal:9000"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.agent.endpoint, "http://agent.internal:9000");
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TESTFLOW_TEST_KEY", "secret-123");
        let content = r#"
            [agent]
            api_key = "${TESTFLOW_TEST_KEY}"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.agent.api_key.as_deref(), Some("secret-123"));
    }

    #[test]
    fn test_env_var_missing() {
        let content = r#"
            [agent]
            api_key = "${TESTFLOW_DEFINITELY_NOT_SET}"
        "#;
        let result = ConfigLoader::load_str(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/.testflow");
        assert!(!expanded.starts_with('~'));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 5000").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(result.is_err());
    }
}
