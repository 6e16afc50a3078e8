//! Command implementations and dispatch logic.
//!
//! Each command is an async function that takes a CommandContext.

use std::collections::HashMap;
use std::time::Duration;

use camino::Utf8PathBuf;
use pea_config::{ConfigLayering, ConfigLoader, RegistrySettings};
use pea_core::error::{PeaError, PeaResult};
use pea_registry::{AgentOptions, ClientOptions, RetryConfig};
use tracing::info;

pub mod agent;
pub mod view;


use crate::{output::OutputHandler, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub output: OutputHandler,
    pub settings: RegistrySettings,
}

impl CommandContext {
    /// Create a new command context, loading registry configuration
    pub async fn new(registry: Option<String>) -> PeaResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| PeaError::io("Failed to get current directory".to_string(), e))?;

        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| PeaError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("Current directory is not valid UTF-8: {}", path.display()),
        })?;

        let cli_overrides: HashMap<String, String> = registry
            .map(|url| HashMap::from([("registry".to_string(), url)]))
            .unwrap_or_default();

        let settings = ConfigLoader::new(cwd)
            .load(ConfigLayering::collect_env_overrides(), cli_overrides)
            .await?;

        Ok(Self {
            output: OutputHandler::new(),
            settings,
        })
    }
}

/// Translate resolved settings into registry client options
pub fn client_options(settings: &RegistrySettings) -> ClientOptions {
    let network = &settings.network;

    ClientOptions {
        registry: settings.url.clone(),
        scopes: settings.scopes.clone(),
        agent: AgentOptions {
            max_idle_per_host: network.max_idle_per_host,
            idle_timeout: Duration::from_secs(network.idle_timeout_secs),
            timeout: Duration::from_secs(network.timeout_secs),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs),
            ..AgentOptions::default()
        },
        retry: RetryConfig {
            max_retries: network.retries,
            ..RetryConfig::default()
        },
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> PeaResult<()> {
    match command {
        Commands::Agent { urls } => {
            info!("Resolving agents for {} URL(s)", urls.len());
            agent::execute(urls, ctx).await
        }
        Commands::View { package } => {
            info!("Viewing package: {}", package);
            view::execute(package, ctx).await
        }
    }
}
