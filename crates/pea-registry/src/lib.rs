//! npm registry client for Pea runtime
//!
//! This crate decides which connection pool each registry request goes
//! through, and provides the HTTP client that fetches package metadata and
//! tarballs with those pools, retry logic and integrity checks.

pub mod agent;
pub mod api;
pub mod client;

// Re-export main types
pub use agent::{
    Agent, AgentFactory, AgentOptions, BaseAgent, HttpAgent, HttpsAgent, RegistryAgent,
    RegistryIdentity, Transport, AGENT_NAME_PREFIX, DEFAULT_REGISTRY_HOST,
};
pub use api::{DistInfo, PackageMetadataResponse, VersionMetadata};
pub use client::{ClientOptions, RegistryClient, RetryConfig, DEFAULT_REGISTRY};

use pea_core::error::PeaError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, PeaError>;
