//! Per-registry pooling agents
//!
//! reqwest keeps one connection pool per `Client`, so the `Client` plays the
//! role of an agent here. Traffic to the public npm registry goes through the
//! shared default client. Every other registry gets its own `RegistryAgent`,
//! named `AgentFor:<registry>`, so sockets opened for one registry (and the
//! credentials they carry) are never reused against another.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, trace};
use url::{Position, Url};

use pea_core::error::PeaError;
use crate::RegistryResult;

/// Host of the public npm registry
pub const DEFAULT_REGISTRY_HOST: &str = "registry.npmjs.org";

/// Prefix of every minted agent name
pub const AGENT_NAME_PREFIX: &str = "AgentFor:";

/// Connection settings shared by every agent
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Idle sockets kept per host
    pub max_idle_per_host: usize,
    /// How long an idle socket stays in the pool
    pub idle_timeout: Duration,
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Accept gzip-encoded responses
    pub gzip: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_idle_per_host: 50,
            idle_timeout: Duration::from_secs(90),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("pea/", env!("CARGO_PKG_VERSION")).to_string(),
            gzip: true,
        }
    }
}

impl AgentOptions {
    fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .pool_max_idle_per_host(self.max_idle_per_host)
            .pool_idle_timeout(self.idle_timeout)
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .gzip(self.gzip)
            .user_agent(self.user_agent.clone())
    }
}

/// Transport an agent pools sockets for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Plain TCP (`http:`)
    Plain,
    /// TLS (`https:`)
    Encrypted,
}

/// Socket-pooling behavior the HTTP client understands
pub trait Agent: Send + Sync {
    /// Name of the agent; also the key of its connection pool
    fn name(&self) -> &str;

    /// Transport this agent opens connections with
    fn transport(&self) -> Transport;

    /// Build the pooled client that issues requests for this agent
    fn build_client(&self, options: &AgentOptions) -> RegistryResult<Client>;
}

fn finish(builder: ClientBuilder, agent: &str) -> RegistryResult<Client> {
    builder.build().map_err(|e| {
        PeaError::network(format!("Failed to create HTTP client for {}", agent), e)
    })
}

/// Plain-transport base agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpAgent;

impl Agent for HttpAgent {
    fn name(&self) -> &str {
        "HttpAgent"
    }

    fn transport(&self) -> Transport {
        Transport::Plain
    }

    fn build_client(&self, options: &AgentOptions) -> RegistryResult<Client> {
        finish(options.client_builder(), self.name())
    }
}

/// Encrypted-transport base agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpsAgent;

impl Agent for HttpsAgent {
    fn name(&self) -> &str {
        "HttpsAgent"
    }

    fn transport(&self) -> Transport {
        Transport::Encrypted
    }

    fn build_client(&self, options: &AgentOptions) -> RegistryResult<Client> {
        finish(options.client_builder().https_only(true), self.name())
    }
}

/// One of the two base agents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAgent {
    Http(HttpAgent),
    Https(HttpsAgent),
}

impl BaseAgent {
    /// Pick the base agent for a URL scheme; anything but `https` is plain
    pub fn for_scheme(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("https") {
            BaseAgent::Https(HttpsAgent)
        } else {
            BaseAgent::Http(HttpAgent)
        }
    }

    fn inner(&self) -> &dyn Agent {
        match self {
            BaseAgent::Http(agent) => agent as &dyn Agent,
            BaseAgent::Https(agent) => agent as &dyn Agent,
        }
    }
}

impl Agent for BaseAgent {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn transport(&self) -> Transport {
        self.inner().transport()
    }

    fn build_client(&self, options: &AgentOptions) -> RegistryResult<Client> {
        self.inner().build_client(options)
    }
}

/// `scheme://[userinfo@]host[:port]` of a registry
///
/// Taken from the authority exactly as written, once the parser has accepted
/// the URL. Only the scheme and host are lowercased; explicit ports (default
/// ones included) and userinfo are kept verbatim. Paths, queries and
/// fragments are ignored.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RegistryIdentity {
    value: String,
    scheme_end: usize,
    userinfo: Option<(usize, usize)>,
}

impl RegistryIdentity {
    /// Derive the identity of `input`, which `url` was parsed from
    pub fn from_input(input: &str, url: &Url) -> Self {
        let scheme = url.scheme();
        let parsed = &url[Position::BeforeUsername..Position::AfterPort];
        let authority = raw_authority(input, scheme)
            .filter(|authority| !authority.is_empty())
            .unwrap_or(parsed);

        let (userinfo, host_port) = match authority.rfind('@') {
            Some(at) => (&authority[..at], &authority[at + 1..]),
            None => ("", authority),
        };

        let mut value = format!("{}://", scheme);
        let start = value.len();
        let userinfo = if userinfo.is_empty() {
            None
        } else {
            value.push_str(userinfo);
            let end = value.len();
            value.push('@');
            Some((start, end))
        };
        value.push_str(&host_port.to_lowercase());

        Self {
            value,
            scheme_end: scheme.len(),
            userinfo,
        }
    }

    /// Parse a URL string and derive its identity
    pub fn parse(input: &str) -> RegistryResult<Self> {
        let url = Url::parse(input).map_err(|e| PeaError::invalid_url(input, e))?;
        Ok(Self::from_input(input, &url))
    }

    /// Exact identity string
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// URL scheme
    pub fn scheme(&self) -> &str {
        &self.value[..self.scheme_end]
    }

    /// `user[:password]` part, if the URL carried credentials
    pub fn userinfo(&self) -> Option<&str> {
        self.userinfo.map(|(start, end)| &self.value[start..end])
    }

    /// `host[:port]` part
    pub fn host_port(&self) -> &str {
        match self.userinfo {
            Some((_, end)) => &self.value[end + 1..],
            None => &self.value[self.scheme_end + 3..],
        }
    }

    /// Identity safe for logs: any password is replaced by `***`
    pub fn redacted(&self) -> String {
        match self.userinfo() {
            Some(userinfo) => {
                let user = userinfo.split(':').next().unwrap_or_default();
                let masked = if userinfo.contains(':') {
                    format!("{}:***", user)
                } else {
                    user.to_string()
                };
                format!("{}://{}@{}", self.scheme(), masked, self.host_port())
            }
            None => self.value.clone(),
        }
    }
}

/// Authority section of `input` as written, between `scheme://` and the path
fn raw_authority<'a>(input: &'a str, scheme: &str) -> Option<&'a str> {
    let input = input.trim_matches(|c: char| c <= ' ');
    let head = input.get(..scheme.len())?;
    if !head.eq_ignore_ascii_case(scheme) {
        return None;
    }

    let rest = input[scheme.len()..].strip_prefix("://")?;
    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#' | '\\'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

impl fmt::Debug for RegistryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegistryIdentity").field(&self.redacted()).finish()
    }
}

impl fmt::Display for RegistryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Agent scoped to a single registry
///
/// Builds exactly the client its base agent builds. It exists so that each
/// registry has a distinct agent and a distinct pool key.
pub struct RegistryAgent {
    name: String,
    registry: RegistryIdentity,
    base: BaseAgent,
}

impl RegistryAgent {
    /// Registry this agent serves
    pub fn registry(&self) -> &RegistryIdentity {
        &self.registry
    }

    /// Base agent every operation is forwarded to
    pub fn base(&self) -> BaseAgent {
        self.base
    }

    /// Agent name with any password masked
    pub fn display_name(&self) -> String {
        format!("{}{}", AGENT_NAME_PREFIX, self.registry.redacted())
    }
}

impl Agent for RegistryAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> Transport {
        self.base.transport()
    }

    fn build_client(&self, options: &AgentOptions) -> RegistryResult<Client> {
        self.base.build_client(options)
    }
}

impl fmt::Debug for RegistryAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAgent")
            .field("name", &self.display_name())
            .field("base", &self.base)
            .finish()
    }
}

impl fmt::Display for RegistryAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Whether a URL points at the public npm registry
///
/// Matches `http`/`https` URLs on `registry.npmjs.org` with no credentials
/// and either no port or port 80. Mirrors and aliases do not match.
pub fn is_default_registry(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url.username().is_empty()
        && url.password().is_none()
        && url.host_str() == Some(DEFAULT_REGISTRY_HOST)
        && matches!(url.port(), None | Some(80))
}

/// Hands out one agent per registry for the life of the factory
#[derive(Debug, Default)]
pub struct AgentFactory {
    /// Minted agents; entries are never replaced or removed
    agents: DashMap<RegistryIdentity, Arc<RegistryAgent>>,
    /// Number of agents ever minted
    minted: AtomicUsize,
}

impl AgentFactory {
    /// Create a factory with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent to use for `package_url`, or `None` for the default pool
    ///
    /// URLs with the same scheme, credentials and `host:port` always get the
    /// same `Arc`. Fails only when the URL does not parse.
    pub fn get_agent_class_for_url(&self, package_url: &str) -> RegistryResult<Option<Arc<RegistryAgent>>> {
        let url = Url::parse(package_url).map_err(|e| PeaError::invalid_url(package_url, e))?;

        if is_default_registry(&url) {
            trace!(url = %url.origin().ascii_serialization(), "default registry, using shared pool");
            return Ok(None);
        }

        let identity = RegistryIdentity::from_input(package_url, &url);

        let cached = self.agents.get(&identity).map(|agent| Arc::clone(agent.value()));
        if let Some(agent) = cached {
            trace!(registry = %identity, "reusing registry agent");
            return Ok(Some(agent));
        }

        // The entry holds the shard lock, so racing callers mint once.
        let agent = self
            .agents
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(self.mint_agent_for_registry(identity)));

        Ok(Some(Arc::clone(agent.value())))
    }

    /// Build a new agent for `registry` without caching it
    pub fn mint_agent_for_registry(&self, registry: RegistryIdentity) -> RegistryAgent {
        let base = BaseAgent::for_scheme(registry.scheme());
        self.minted.fetch_add(1, Ordering::Relaxed);

        let agent = RegistryAgent {
            name: format!("{}{}", AGENT_NAME_PREFIX, registry.as_str()),
            registry,
            base,
        };
        debug!(agent = %agent, base = agent.base.name(), "minted registry agent");
        agent
    }

    /// How many agents have been minted so far
    pub fn minted_count(&self) -> usize {
        self.minted.load(Ordering::Relaxed)
    }

    /// Number of cached registry agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no registry agent has been cached yet
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Snapshot of the cached agents
    pub fn agents(&self) -> Vec<Arc<RegistryAgent>> {
        self.agents.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

#[cfg(test)]
mod tests;
