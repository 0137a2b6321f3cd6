//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p pulse-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use pulse_common::{try_init_tracing, ClientConfig};
use pulse_gateway::{GatewayClient, GatewayEvent, GatewayOptions};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the client
    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting gateway client...");

    // Load configuration
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        url = %config.gateway_url,
        shard = config.shard_id,
        shard_count = config.shard_count,
        "Configuration loaded"
    );

    let options =
        GatewayOptions::new(config.token).with_shard(config.shard_id, config.shard_count);
    let (client, mut events) = GatewayClient::new(options)?;

    client.connect(Some(&config.gateway_url)).await?;

    let watcher = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            watcher.kill().await;
        }
    });

    while let Some(event) = events.recv().await {
        match event {
            GatewayEvent::Ready { session_id, user_id } => {
                info!(session_id = %session_id, user_id = %user_id, "Session ready");
            }
            GatewayEvent::Resumed => info!("Session resumed"),
            GatewayEvent::Dispatch { name, sequence, .. } => {
                info!(event = %name, sequence = ?sequence, "Dispatch");
            }
            GatewayEvent::Close { code, reason } => {
                warn!(code = ?code, reason = %reason, "Connection closed");
            }
            GatewayEvent::Warn { message } => warn!(message = %message, "Gateway warning"),
            GatewayEvent::Killed => {
                info!("Engine terminated");
                break;
            }
        }
    }

    Ok(())
}
