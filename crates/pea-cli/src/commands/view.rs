//! `pea view` command implementation.
//!
//! Fetches abbreviated metadata from the registry serving the package.

use pea_core::error::{PeaError, PeaResult};
use pea_registry::{RegistryClient, AGENT_NAME_PREFIX};

use super::{agent::redact_url, client_options, CommandContext};

/// Execute the `pea view` command
pub async fn execute(package: String, ctx: &CommandContext) -> PeaResult<()> {
    let client = RegistryClient::with_options(client_options(&ctx.settings))?;

    ctx.output.info(&format!(
        "Fetching {} from {}",
        package,
        redact_url(client.registry_for_package(&package))
    ));

    let metadata = client.fetch_metadata(&package).await?;
    let latest = metadata.latest().ok_or_else(|| PeaError::PackageNotFound {
        name: format!("{}@latest", package),
    })?;

    ctx.output.success(&format!("{}@{}", metadata.name, latest.version));
    ctx.output.info(&format!("  tarball: {}", redact_url(&latest.dist.tarball)));
    ctx.output.info(&format!("  dependencies: {}", latest.dependencies.len()));

    for name in client.pooled_agents() {
        ctx.output.info(&format!("  pool: {}", pool_label(&name)));
    }

    Ok(())
}

/// Registry served by a pooled agent, with any password masked
pub fn pool_label(agent_name: &str) -> String {
    redact_url(agent_name.strip_prefix(AGENT_NAME_PREFIX).unwrap_or(agent_name))
}
