//! Registry configuration for Pea runtime
//!
//! This crate reads the `[registry]` and `[network]` sections of pea.toml and
//! the global ~/.pea/config.toml, and layers them with environment and CLI
//! overrides into the settings the registry client runs with.

pub mod registry;
pub mod merge;

// Re-export main types
pub use registry::{ConfigFile, NetworkSettings, RegistrySettings, DEFAULT_REGISTRY_URL};
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};

use pea_core::error::PeaError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PeaError>;
