//! CLI Status Command
//!
//! Reports the effective config (secrets redacted), provider reachability,
//! and whether a gateway is answering on the configured address.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use intentforge_config::{redact, IntentForgeConfig};
use intentforge_router::Router;

use crate::output;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Loopback URL for the health endpoint; wildcard binds are probed on 127.0.0.1.
pub fn health_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        addr.ip().to_string()
    };
    format!("http://{host}:{}/api/health", addr.port())
}

pub async fn run(
    config_path: &Path,
    config: &IntentForgeConfig,
    router: &Router,
    addr: SocketAddr,
    cancel: &CancellationToken,
) -> Result<()> {
    println!("\nIntentForge status\n");
    println!("Config: {}", config_path.display());
    println!("{}\n", serde_json::to_string_pretty(&redact(&serde_json::to_value(config)?))?);

    println!("Providers:");
    let statuses = router.status(cancel).await;
    print!("{}", output::status_table(&statuses));
    println!();

    let url = health_url(addr);
    let client = reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build()?;
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await?;
            output::note_success(&format!(
                "Gateway answering on {addr} (version {})",
                body["version"].as_str().unwrap_or("unknown")
            ));
        }
        Ok(resp) => output::note_warn(&format!("Gateway on {addr} returned {}", resp.status())),
        Err(_) => output::note_warn(&format!("Gateway is not running on {addr}")),
    }

    if statuses.iter().any(|s| !s.reachable) {
        output::note_warn("Some providers are unreachable; requests will fail until they are up");
    }
    Ok(())
}
