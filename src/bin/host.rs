//! Dispatch host: listens to the interaction manager and drives the map
//! automation process over stdin/stdout.
//!
//! Stdout carries one JSON automation request per line and stdin receives the
//! replies, so all tracing output goes to stderr.
//!
//! Usage: `mmi-dispatch-host [CONFIG_PATH]`

use mmi_dispatch::automation::{self, stdio::run_stdio_automation};
use mmi_dispatch::catalog::register_catalog;
use mmi_dispatch::registry::Capability;
use mmi_dispatch::{DispatchConfig, Dispatcher, RegistryBuilder, channels, feedback};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn load_config() -> anyhow::Result<DispatchConfig> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(DispatchConfig::default_config_path);
    let config = if path.exists() {
        tracing::info!(path = %path.display(), "loading configuration");
        DispatchConfig::from_file(&path)?
    } else if explicit.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    } else {
        tracing::info!(path = %path.display(), "no configuration file; using defaults");
        DispatchConfig::default()
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("mmi-dispatch-host starting");
    let config = load_config()?;

    let (client, requests) =
        automation::channel(config.automation.queue_size, config.automation.timeout());
    let mut builder = RegistryBuilder::new();
    register_catalog(&mut builder, |intent| {
        Arc::new(client.capability(intent)) as Arc<dyn Capability>
    })?;
    for intent in builder.apply_overrides(&config.confirmation.overrides) {
        tracing::warn!(intent = %intent, "confirmation override names an unregistered intent");
    }
    let registry = builder.build();
    registry.check_gesture_coverage()?;
    tracing::info!(intents = registry.len(), "capability registry ready");

    let (emitter, feedback_worker) = feedback::start(&config.feedback);
    let dispatcher = Dispatcher::new(Arc::new(registry), &config, emitter);

    let cancel = CancellationToken::new();
    let bridge_cancel = cancel.clone();
    let bridge = tokio::spawn(async move {
        if let Err(e) = run_stdio_automation(requests).await {
            tracing::error!(error = %e, "automation bridge failed");
        }
        // Without the automation process nothing can execute.
        bridge_cancel.cancel();
    });

    tokio::spawn(channels::cancel_on_interrupt(tokio::signal::ctrl_c(), cancel.clone()));

    let result = channels::run_runtime(config, dispatcher, cancel.clone()).await;
    cancel.cancel();
    drop(client);
    bridge.abort();
    if let Some(worker) = feedback_worker {
        worker.abort();
    }

    result.map_err(|e| {
        tracing::error!(error = %e, "mmi-dispatch-host exited with error");
        anyhow::anyhow!("mmi-dispatch-host failed: {e}")
    })?;
    tracing::info!("mmi-dispatch-host shut down cleanly");
    Ok(())
}
