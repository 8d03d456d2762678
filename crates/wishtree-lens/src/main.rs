//! Board node binary
//!
//! Serves one wishing tree board over HTTP and WebSocket.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wishtree_lens::{LensConfig, LensNode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wishtree_lens=info,wishtree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting board node");

    let config = LensConfig::from_env()?;

    let node = LensNode::new(config).await?;
    node.run().await?;

    Ok(())
}
