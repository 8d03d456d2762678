//! Wishtree Lens - board node
//!
//! Serves a shared wishing tree board to browsers. The node holds one
//! [`Session`](wishtree_protocols::Session) over an in-memory claims store
//! and exposes it through:
//!
//! - **API**: HTTP endpoints to read the board and hang wishes
//! - **WebSocket**: a live feed of board changes
//!
//! # Example
//!
//! ```no_run
//! use wishtree_lens::{LensConfig, LensNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LensConfig::from_env()?;
//!     let node = LensNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod node;
pub mod ws;

pub use error::{Error, Result};
pub use node::{LensConfig, LensNode, LensState, NodeSession};
