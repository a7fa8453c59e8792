//! Reconciles the configured resource packs once and reports the result.
//!
//! Usage: `ms-packs [config.toml]`

use anyhow::Context;
use ms::resourcepack::{PackDelivery, PackInfo};
use ms::util::PlayerId;
use ms::{init_logging, AppContext, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// There are no players to deliver to from the command line
struct LogDelivery;

impl PackDelivery for LogDelivery {
    fn send_packs(&self, player: PlayerId, packs: &[PackInfo]) {
        tracing::info!("Would send {} resource packs to {}", packs.len(), player);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ms.toml"));

    let mut config = ServerConfig::load_or_create(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }

    init_logging(&config.logging)?;

    let context = AppContext::new(config, Arc::new(LogDelivery))?;
    let summary = context.load_resource_packs().await?;

    for (key, pack) in context.resource_packs() {
        match pack.data().info() {
            Some(info) => tracing::info!("{} ({}): {} sha1={} id={}", key, pack.name(), info.uri, info.hash, info.id),
            None => tracing::info!("{} ({}): disabled", key, pack.name()),
        }
    }

    context.shutdown();

    if !summary.failed.is_empty() {
        for (key, error) in &summary.failed {
            tracing::error!("{}: {}", key, error);
        }

        anyhow::bail!("{} of {} resource packs failed to load", summary.failed.len(), summary.failed.len() + summary.loaded.len());
    }

    Ok(())
}
