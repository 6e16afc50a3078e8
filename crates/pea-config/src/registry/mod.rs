//! `[registry]` and `[network]` sections of pea.toml

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use url::Url;

use pea_core::error::PeaError;
use crate::ConfigResult;

/// Public npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Registry-related tables of a config file; every value is optional so
/// layers only override what they set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: RegistryTable,
    #[serde(default)]
    pub network: NetworkTable,
}

/// `[registry]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryTable {
    /// Registry for unscoped packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `[registry.scopes]`: `"@scope" = "https://..."`
    #[serde(default)]
    pub scopes: HashMap<String, String>,
}

/// `[network]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_per_host: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// Fully resolved registry settings
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    /// Registry for unscoped packages and unconfigured scopes
    pub url: String,
    /// Per-scope registries
    pub scopes: HashMap<String, String>,
    /// Connection settings
    pub network: NetworkSettings,
}

/// Resolved `[network]` values
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub max_idle_per_host: usize,
    pub idle_timeout_secs: u64,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retries: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_idle_per_host: 50,
            idle_timeout_secs: 90,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            retries: 3,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            scopes: HashMap::new(),
            network: NetworkSettings::default(),
        }
    }
}

impl RegistrySettings {
    /// Overlay every value `file` sets
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(url) = file.registry.url {
            self.url = url;
        }
        self.scopes.extend(file.registry.scopes);

        let network = file.network;
        if let Some(value) = network.max_idle_per_host {
            self.network.max_idle_per_host = value;
        }
        if let Some(value) = network.idle_timeout_secs {
            self.network.idle_timeout_secs = value;
        }
        if let Some(value) = network.timeout_secs {
            self.network.timeout_secs = value;
        }
        if let Some(value) = network.connect_timeout_secs {
            self.network.connect_timeout_secs = value;
        }
        if let Some(value) = network.retries {
            self.network.retries = value;
        }
    }

    /// Registry URLs must be absolute http(s) URLs and scope keys `@name`
    pub fn validate(&self) -> ConfigResult<()> {
        validate_registry_url("registry.url", &self.url)?;

        for (scope, url) in &self.scopes {
            if !is_valid_scope(scope) {
                return Err(PeaError::ConfigValidation {
                    field: format!("registry.scopes.{}", scope),
                    reason: "Scope names must look like @scope".to_string(),
                });
            }
            validate_registry_url(&format!("registry.scopes.{}", scope), url)?;
        }

        if self.network.timeout_secs == 0 {
            return Err(PeaError::ConfigValidation {
                field: "network.timeout-secs".to_string(),
                reason: "Timeout must be at least one second".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse the registry tables out of a pea.toml or config.toml document
pub fn parse_config_file(file: &str, content: &str) -> ConfigResult<ConfigFile> {
    // toml_edit first for precise syntax error locations
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| toml_error(file, content, e.message(), e.span()))?;

    toml::from_str(content).map_err(|e| toml_error(file, content, e.message(), e.span()))
}

/// Serialize a config file back to TOML
pub fn serialize_config_file(file: &str, config: &ConfigFile) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| PeaError::TomlParse {
        file: file.to_string(),
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

fn toml_error(file: &str, content: &str, message: &str, span: Option<Range<usize>>) -> PeaError {
    let (line, column) = span
        .map(|span| line_column(content, span.start))
        .unwrap_or((0, 0));

    PeaError::TomlParse {
        file: file.to_string(),
        message: message.trim().to_string(),
        line,
        column,
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, column)
}

fn validate_registry_url(field: &str, value: &str) -> ConfigResult<()> {
    let url = Url::parse(value).map_err(|e| PeaError::ConfigValidation {
        field: field.to_string(),
        reason: format!("'{}' is not an absolute URL: {}", value, e),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PeaError::ConfigValidation {
            field: field.to_string(),
            reason: format!("'{}' must use http or https", value),
        });
    }

    Ok(())
}

fn is_valid_scope(scope: &str) -> bool {
    scope
        .strip_prefix('@')
        .map_or(false, |name| !name.is_empty() && !name.contains('/'))
}
