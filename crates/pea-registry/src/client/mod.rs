//! HTTP client that routes every request through its registry's agent

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use pea_core::error::PeaError;
use crate::agent::{Agent, AgentFactory, AgentOptions, HttpAgent};
use crate::api::{DistInfo, PackageMetadataResponse, ABBREVIATED_METADATA};
use crate::RegistryResult;

/// Public npm registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Registries and connection settings for a [`RegistryClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Registry for unscoped packages and unconfigured scopes
    pub registry: String,
    /// `@scope` to registry URL
    pub scopes: HashMap<String, String>,
    /// Settings every agent builds its client with
    pub agent: AgentOptions,
    /// Retry policy
    pub retry: RetryConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            scopes: HashMap::new(),
            agent: AgentOptions::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Main HTTP client for npm registry operations
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Decides which agent a URL belongs to
    agents: Arc<AgentFactory>,
    /// Pool used when the factory says "default"
    default_client: Client,
    /// One client per registry agent, keyed by agent name
    pools: Arc<DashMap<String, Client>>,
    options: ClientOptions,
}

impl RegistryClient {
    /// Create a client for the public registry with default settings
    pub fn new() -> RegistryResult<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Create a client with its own agent factory
    pub fn with_options(options: ClientOptions) -> RegistryResult<Self> {
        Self::with_factory(options, Arc::new(AgentFactory::new()))
    }

    /// Create a client sharing `agents` with other clients
    pub fn with_factory(options: ClientOptions, agents: Arc<AgentFactory>) -> RegistryResult<Self> {
        let default_client = HttpAgent.build_client(&options.agent)?;

        Ok(Self {
            agents,
            default_client,
            pools: Arc::new(DashMap::new()),
            options,
        })
    }

    /// Agent factory this client consults
    pub fn agents(&self) -> &AgentFactory {
        &self.agents
    }

    /// Names of the agents that own a connection pool, sorted
    pub fn pooled_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// HTTP client whose pool `url` must be fetched through
    pub fn client_for_url(&self, url: &str) -> RegistryResult<Client> {
        let agent = match self.agents.get_agent_class_for_url(url)? {
            Some(agent) => agent,
            None => return Ok(self.default_client.clone()),
        };

        let pooled = self.pools.get(agent.name()).map(|client| client.value().clone());
        if let Some(client) = pooled {
            return Ok(client);
        }

        let client = self
            .pools
            .entry(agent.name().to_string())
            .or_try_insert_with(|| {
                debug!(agent = %agent, "creating connection pool");
                agent.build_client(&self.options.agent)
            })?;

        Ok(client.value().clone())
    }

    /// Registry serving `package_name`
    pub fn registry_for_package(&self, package_name: &str) -> &str {
        if package_name.starts_with('@') {
            if let Some(scope) = package_name.split('/').next() {
                if let Some(registry) = self.options.scopes.get(scope) {
                    return registry;
                }
            }
        }
        &self.options.registry
    }

    /// Execute HTTP request with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RegistryResult<T>>,
    {
        let retry = &self.options.retry;
        let mut delay = retry.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) if attempt < retry.max_retries && error.is_recoverable() => {
                    attempt += 1;
                    warn!(attempt, max_retries = retry.max_retries, error = %error, "retrying registry request");

                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis((delay.as_millis() as f64 * retry.multiplier) as u64),
                        retry.max_delay,
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Fetch abbreviated package metadata from the package's registry
    pub async fn fetch_metadata(&self, package_name: &str) -> RegistryResult<PackageMetadataResponse> {
        let registry = self.registry_for_package(package_name).trim_end_matches('/');
        let url = format!("{}/{}", registry, encode_package_name(package_name));
        let client = self.client_for_url(&url)?;

        self.with_retry(|| async {
            let response = client
                .get(&url)
                .header(reqwest::header::ACCEPT, ABBREVIATED_METADATA)
                .send()
                .await
                .map_err(|e| PeaError::network(format!("Failed to fetch metadata for {}", package_name), e))?;

            let response = check_status(response, package_name)?;

            response
                .json::<PackageMetadataResponse>()
                .await
                .map_err(|e| PeaError::network(format!("Failed to parse metadata for {}", package_name), e))
        })
        .await
    }

    /// Download a package tarball and verify its integrity
    pub async fn download_tarball(&self, package_name: &str, dist: &DistInfo) -> RegistryResult<Vec<u8>> {
        let client = self.client_for_url(&dist.tarball)?;

        self.with_retry(|| async {
            let response = client
                .get(&dist.tarball)
                .send()
                .await
                .map_err(|e| PeaError::network(format!("Failed to download tarball for {}", package_name), e))?;

            let bytes = check_status(response, package_name)?
                .bytes()
                .await
                .map_err(|e| PeaError::network(format!("Failed to read tarball for {}", package_name), e))?
                .to_vec();

            verify_integrity(package_name, &bytes, dist)?;

            Ok(bytes)
        })
        .await
    }
}

/// Map registry status codes onto errors
fn check_status(response: Response, package_name: &str) -> RegistryResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(PeaError::PackageNotFound {
            name: package_name.to_string(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PeaError::PermissionDenied {
            permission: "read".to_string(),
            resource: package_name.to_string(),
        }),
        status => Err(PeaError::Network {
            message: format!("Registry returned status {} for {}", status, package_name),
            source: None,
        }),
    }
}

/// Encode package name for URL (handle scoped packages)
fn encode_package_name(name: &str) -> String {
    if name.starts_with('@') {
        // @org/pkg -> @org%2fpkg
        name.replace('/', "%2f")
    } else {
        name.to_string()
    }
}

/// Check tarball bytes against SRI `sha512-` hashes, else the SHA-1 shasum
fn verify_integrity(package_name: &str, bytes: &[u8], dist: &DistInfo) -> RegistryResult<()> {
    use base64::{engine::general_purpose, Engine as _};
    use sha1::Sha1;
    use sha2::{Digest, Sha512};

    let sri: Vec<&str> = dist
        .integrity
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|hash| hash.strip_prefix("sha512-"))
        .collect();

    if !sri.is_empty() {
        let computed = general_purpose::STANDARD.encode(Sha512::digest(bytes));
        if sri.contains(&computed.as_str()) {
            return Ok(());
        }
        return Err(PeaError::IntegrityFailure {
            package: package_name.to_string(),
            expected: format!("sha512-{}", sri[0]),
            actual: format!("sha512-{}", computed),
        });
    }

    let computed = format!("{:x}", Sha1::digest(bytes));
    if computed.eq_ignore_ascii_case(&dist.shasum) {
        Ok(())
    } else {
        Err(PeaError::IntegrityFailure {
            package: package_name.to_string(),
            expected: dist.shasum.clone(),
            actual: computed,
        })
    }
}
