//! Conversational payment bot over Open Payments.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p interpay-bot --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p interpay-bot
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p interpay-bot
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `BOT_TOKEN` — Override for the chat transport credential
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use interpay::account::PaymentPointer;
use interpay_bot::config::BotConfig;
use interpay_bot::contacts::JsonContactStore;
use interpay_bot::engine::Engine;
use interpay_bot::transport::{ChatTransport, ConsoleTransport};
use interpay_http::client::NetworkClient;
use interpay_http::orchestrator::PaymentOrchestrator;
use interpay_http::resolver::AccountResolver;
use interpay_http::signature::SigningIdentity;

#[tokio::main]
async fn main() {
    // Initialize tracing with RUST_LOG env filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Bot failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = BotConfig::load()?;

    let source = PaymentPointer::parse(&config.wallet.address)?;
    let identity = SigningIdentity::from_base64(
        &config.wallet.key_id,
        &config.wallet.private_key_material()?,
        source.clone(),
    )?;

    let client = NetworkClient::try_new()?;
    let resolver = AccountResolver::new(client.clone());

    // Verify the configured wallet is reachable before accepting events.
    let record = resolver.resolve(&source).await?;
    tracing::info!(
        wallet = %record.id,
        asset = %record.asset_code,
        scale = record.asset_scale,
        "wallet verified"
    );

    let orchestrator =
        PaymentOrchestrator::new(client, identity, source, config.limits.bounds());
    let store = Arc::new(JsonContactStore::new(&config.contacts_path));
    let engine = Arc::new(Engine::new(store, resolver, orchestrator));

    let mut transport = ConsoleTransport::new();
    tracing::info!(
        contacts = %config.contacts_path.display(),
        "bot ready, serving the console transport"
    );

    loop {
        tokio::select! {
            () = shutdown_signal() => break,
            maybe_event = transport.next_event() => {
                let Some(event) = maybe_event else { break };
                let reply = engine.handle_event(&event).await;
                transport.deliver(&event.chat_id, reply).await?;
            }
        }
    }

    tracing::info!("bot shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
