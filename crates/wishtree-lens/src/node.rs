//! Board node - the main application entry point.
//!
//! Architecture:
//! - Single process holding one claims store and one session over it
//! - HTTP API for reading the board and hanging wishes
//! - WebSocket feed pushing session events to browsers

use crate::api;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use wishtree_protocols::{BoardConfig, MemoryClaims, Session};

/// Session type served by the node.
pub type NodeSession = Session<MemoryClaims>;

/// Configuration for a board node.
#[derive(Debug, Clone)]
pub struct LensConfig {
    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Board and session settings
    pub board: BoardConfig,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            board: BoardConfig::default(),
        }
    }
}

impl LensConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let board = defaults.board;

        let api_addr = parse_var(&lookup, "WISHTREE_API_ADDR", defaults.api_addr)?;
        let board_size = parse_var(&lookup, "WISHTREE_BOARD_SIZE", board.board_size)?;
        let max_message_len = parse_var(&lookup, "WISHTREE_MAX_MESSAGE", board.max_message_len)?;
        let max_author_len = parse_var(&lookup, "WISHTREE_MAX_AUTHOR", board.max_author_len)?;
        let anonymous_label = lookup("WISHTREE_ANONYMOUS_LABEL")
            .map(|label| label.trim().to_string())
            .unwrap_or(board.anonymous_label);
        let timeout_ms = parse_var(
            &lookup,
            "WISHTREE_REQUEST_TIMEOUT_MS",
            board.request_timeout.as_millis() as u64,
        )?;

        let board = BoardConfig {
            board_size,
            max_message_len,
            max_author_len,
            anonymous_label,
            request_timeout: Duration::from_millis(timeout_ms),
            ..board
        };
        board.validate()?;

        Ok(Self { api_addr, board })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

/// Shared state for the node - one session shared by all handlers.
pub struct LensState {
    pub session: NodeSession,
    pub claims: MemoryClaims,
    pub config: LensConfig,
}

impl LensState {
    /// Start a session over a fresh in-memory claims store.
    pub fn start(config: LensConfig) -> Result<Self> {
        let claims = MemoryClaims::new();
        let session = Session::start(Arc::new(claims.clone()), config.board.clone())?;
        Ok(Self {
            session,
            claims,
            config,
        })
    }
}

/// A board node instance.
pub struct LensNode {
    state: Arc<RwLock<LensState>>,
    config: LensConfig,
}

impl LensNode {
    /// Create a new board node. Must run inside a tokio runtime.
    pub async fn new(config: LensConfig) -> Result<Self> {
        let state = Arc::new(RwLock::new(LensState::start(config.clone())?));
        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<RwLock<LensState>> {
        Arc::clone(&self.state)
    }

    /// Run the node until Ctrl-C, then close the session.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Board node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!(
            "  Board: {} rows, messages up to {} chars",
            self.config.board.board_size.saturating_sub(1),
            self.config.board.max_message_len
        );

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.write().await.session.shutdown().await?;
        tracing::info!("Board node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
