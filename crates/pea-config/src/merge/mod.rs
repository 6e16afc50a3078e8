//! Configuration layering, fallback logic, and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use pea_core::error::PeaError;
use crate::registry::{parse_config_file, ConfigFile, RegistrySettings};
use crate::ConfigResult;

/// Environment variable overriding the default registry
pub const ENV_REGISTRY: &str = "PEA_REGISTRY";
/// Prefix of per-scope registry variables, e.g. `PEA_REGISTRY_SCOPE_ACME`
pub const ENV_SCOPE_PREFIX: &str = "PEA_REGISTRY_SCOPE_";
/// Request timeout in seconds
pub const ENV_TIMEOUT: &str = "PEA_NETWORK_TIMEOUT";
/// Retry count
pub const ENV_RETRIES: &str = "PEA_NETWORK_RETRIES";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Directory holding `.pea/config.toml`
    home: Option<Utf8PathBuf>,
}

/// Configuration layering and merging
pub struct ConfigLayering;

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project pea.toml file
    Project(Utf8PathBuf),
}

impl ConfigLoader {
    /// Create a new configuration loader using the user's home directory
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let home = dirs::home_dir().and_then(|home| Utf8PathBuf::try_from(home).ok());
        Self { cwd, home }
    }

    /// Use `home` instead of the user's home directory
    pub fn with_home(mut self, home: Utf8PathBuf) -> Self {
        self.home = Some(home);
        self
    }

    /// Load project pea.toml, if one exists here or in a parent directory
    pub async fn load_project_config(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        let path = self.resolve_config_path("pea.toml");
        if !path.exists() {
            return Ok(None);
        }

        let config = load_from_file(&path).await?;
        Ok(Some((config, ConfigSource::Project(path))))
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Utf8PathBuf {
        let mut current = self.cwd.as_path();

        loop {
            let config_path = current.join(filename);
            if config_path.exists() {
                return config_path;
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // Return path in current directory even if it doesn't exist
        self.cwd.join(filename)
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        let Some(home) = &self.home else {
            return Ok(None);
        };

        let path = home.join(".pea").join("config.toml");
        if !path.exists() {
            return Ok(None);
        }

        let config = load_from_file(&path).await?;
        Ok(Some((config, ConfigSource::Global(path))))
    }

    /// Resolve settings from every layer: global, project, environment, CLI
    pub async fn load(
        &self,
        env_overrides: HashMap<String, String>,
        cli_overrides: HashMap<String, String>,
    ) -> ConfigResult<RegistrySettings> {
        let global = self.load_global_config().await?;
        let project = self.load_project_config().await?;

        for (_, source) in global.iter().chain(project.iter()) {
            debug!(source = ?source, "loaded registry configuration");
        }

        ConfigLayering::merge_configs(
            global.map(|(config, _)| config),
            project.map(|(config, _)| config),
            env_overrides,
            cli_overrides,
        )
    }
}

/// Load the registry tables of a TOML file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<ConfigFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PeaError::io(format!("Failed to read {}", path), e))?;

    parse_config_file(path.as_str(), &content)
}

impl ConfigLayering {
    /// Merge multiple configuration layers and validate the result
    pub fn merge_configs(
        global_config: Option<ConfigFile>,
        project_config: Option<ConfigFile>,
        env_overrides: HashMap<String, String>,
        cli_overrides: HashMap<String, String>,
    ) -> ConfigResult<RegistrySettings> {
        let mut merged = RegistrySettings::default();

        for layer in [global_config, project_config].into_iter().flatten() {
            merged.apply(layer);
        }

        Self::apply_env_overrides(&mut merged, &env_overrides)?;

        // CLI flags have the highest priority
        Self::apply_cli_overrides(&mut merged, &cli_overrides)?;

        merged.validate()?;
        Ok(merged)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: &mut RegistrySettings, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                ENV_REGISTRY => {
                    config.url = value.clone();
                }
                ENV_TIMEOUT => {
                    config.network.timeout_secs = parse_number(key, value)?;
                }
                ENV_RETRIES => {
                    config.network.retries = parse_number(key, value)?;
                }
                key if key.starts_with(ENV_SCOPE_PREFIX) => {
                    let name = key[ENV_SCOPE_PREFIX.len()..].to_lowercase().replace('_', "-");
                    config.scopes.insert(format!("@{}", name), value.clone());
                }
                _ => {
                    // Unknown environment variable, ignore
                }
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(config: &mut RegistrySettings, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "registry" => {
                    config.url = value.clone();
                }
                "timeout" => {
                    config.network.timeout_secs = parse_number("--timeout", value)?;
                }
                _ => {
                    // Unknown CLI override, ignore
                }
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with("PEA_"))
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| PeaError::ConfigValidation {
        field: field.to_string(),
        reason: format!("'{}' is not a valid number: {}", value, e),
    })
}
