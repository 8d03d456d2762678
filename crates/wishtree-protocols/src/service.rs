//! Contract with the claims store.
//!
//! The claims store is the durable, shared side of the board. The session
//! only needs three things from it:
//!
//! - a full read of every claim (bootstrap)
//! - a durable create of one claim, ideally refusing a second claim for the
//!   same slot
//! - a live feed of claims created after the feed was opened
//!
//! Records cross this boundary in their stored shape ([`ClaimRecord`]);
//! turning them into [`Claim`](wishtree_store::Claim)s is the
//! synchronizer's job.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;
use wishtree_store::ClaimRecord;

use crate::error::ServiceError;

/// A claims store.
#[async_trait]
pub trait ClaimsService: Send + Sync + 'static {
    /// Every claim currently stored, in any order.
    async fn read_all(&self) -> Result<Vec<ClaimRecord>, ServiceError>;

    /// Durably store `record` (which has no id) and return it with its id.
    ///
    /// Returns [`ServiceError::Conflict`] when the store enforces slot
    /// uniqueness and the slot is already taken.
    async fn create(&self, record: ClaimRecord) -> Result<ClaimRecord, ServiceError>;

    /// Open a feed of claims created from now on, by any client.
    async fn subscribe_inserts(&self) -> Result<Subscription, ServiceError>;
}

type Release = Box<dyn FnOnce() + Send>;

/// Handle to an open live feed.
///
/// The feed is released exactly once: on [`Subscription::unsubscribe`] or
/// when the handle is dropped, whichever comes first.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ClaimRecord>,
    release: Option<Release>,
}

impl Subscription {
    /// Wrap a receiving end. `release` runs once when the feed is let go.
    pub fn new(
        id: u64,
        rx: mpsc::UnboundedReceiver<ClaimRecord>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Identifier assigned by the service.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the handle still holds the feed.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Next created claim.
    ///
    /// `None` means the feed is gone: either the service dropped it
    /// (disconnect) or this handle was unsubscribed.
    pub async fn recv(&mut self) -> Option<ClaimRecord> {
        if !self.is_active() {
            return None;
        }
        self.rx.recv().await
    }

    /// Release the feed. Safe to call any number of times.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            trace!("Releasing live feed subscription {}", self.id);
            self.rx.close();
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
