//! Wishtree Protocols: keeping a shared board in step.
//!
//! Every viewer holds a local [`OccupancyStore`](wishtree_store::OccupancyStore)
//! of claimed slots. Two things write to it:
//!
//! - the [`ClaimSynchronizer`], which reads the whole board once and then
//!   follows a live feed of new claims from the claims store
//! - the [`ClaimSubmitter`], which applies a local claim optimistically and
//!   then persists it
//!
//! Both fold claims through the same idempotent upsert, so delivery order
//! and duplicates do not matter. A [`Session`] wires the pieces together
//! over any [`ClaimsService`]; [`MemoryClaims`] is an in-process one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wishtree_protocols::{BoardConfig, MemoryClaims, Session};
//! use wishtree_store::SlotCoord;
//!
//! # async fn demo() -> wishtree_protocols::Result<()> {
//! let mut session = Session::start(Arc::new(MemoryClaims::new()), BoardConfig::default())?;
//! let claim = session.submit(SlotCoord::new(3, 0), "peace", "Ann").await?;
//! assert!(session.has(claim.key()).await);
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod service;
pub mod session;
pub mod submitter;
pub mod synchronizer;

pub use config::BoardConfig;
pub use error::{Error, Result, ServiceError, ValidationError};
pub use events::SessionEvent;
pub use memory::MemoryClaims;
pub use service::{ClaimsService, Subscription};
pub use session::{RowView, Session, SlotView};
pub use submitter::ClaimSubmitter;
pub use synchronizer::{ClaimSynchronizer, SharedStore, SyncHandle, SyncState};
