//! `pea agent` command implementation.
//!
//! Prints the connection pool each URL would be fetched through.

use pea_core::error::PeaResult;
use pea_registry::{Agent, AgentFactory, Transport};
use url::Url;

use super::CommandContext;

/// Execute the `pea agent` command
pub async fn execute(urls: Vec<String>, ctx: &CommandContext) -> PeaResult<()> {
    let factory = AgentFactory::new();

    for url in &urls {
        let line = match factory.get_agent_class_for_url(url)? {
            None => format!("{}  default pool", redact_url(url)),
            Some(agent) => {
                let transport = match agent.transport() {
                    Transport::Plain => "http",
                    Transport::Encrypted => "https",
                };
                format!("{}  {} [{}]", redact_url(url), agent, transport)
            }
        };
        ctx.output.info(&line);
    }

    ctx.output.success(&format!(
        "{} URL(s), {} registry agent(s)",
        urls.len(),
        factory.len()
    ));

    Ok(())
}

/// Mask the password of a URL for display
pub fn redact_url(input: &str) -> String {
    match Url::parse(input) {
        Ok(mut url) if url.password().is_some() => {
            // Only fails for URLs that cannot carry credentials
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => input.to_string(),
    }
}
