//! Claim synchronizer: bootstrap, then follow the live feed.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ─→ Bootstrapping ─→ Live ─→ Reconnecting ─→ Live ...
//!                                     │                        │
//!                                     └──────→ Closed ←────────┘
//! ```
//!
//! Bootstrap and the live feed fold claims through the same path
//! ([`OccupancyStore::upsert`]), so a claim delivered twice, or delivered by
//! both, lands once.
//!
//! # Gap Healing
//!
//! The feed only carries claims created after it was opened. A read only
//! counts as healing when the feed was already open when it ran, and on
//! every reconnect the board is read again (unless `heal_on_reconnect` is
//! off). Anything created while the feed was down comes back through the
//! read; anything created during the read comes through the feed;
//! duplicates fold away.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wishtree_store::{Claim, ClaimRecord, OccupancyStore, UpsertOutcome};
use wishtree_topology::BoardGeometry;

use crate::config::BoardConfig;
use crate::error::{Error, Result, ServiceError};
use crate::events::SessionEvent;
use crate::service::{ClaimsService, Subscription};

/// Occupancy store shared by the synchronizer, the submitter and readers.
pub type SharedStore = Arc<RwLock<OccupancyStore>>;

/// Where the synchronizer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Not started yet
    Uninitialized,
    /// Opening the feed and reading the full board
    Bootstrapping,
    /// Following the live feed
    Live,
    /// Feed dropped; re-opening it and healing the gap
    Reconnecting,
    /// Session over; feed released
    Closed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncState::Uninitialized => "uninitialized",
            SyncState::Bootstrapping => "bootstrapping",
            SyncState::Live => "live",
            SyncState::Reconnecting => "reconnecting",
            SyncState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Turn a stored record into a board claim, dropping anything unusable.
pub(crate) fn decode(record: ClaimRecord, board: &BoardGeometry) -> Option<Claim> {
    match Claim::try_from(record) {
        Ok(claim) if board.contains(claim.slot) => Some(claim),
        Ok(claim) => {
            warn!("Skipping claim {:?} at {}: not on the board", claim.id, claim.slot);
            None
        }
        Err(e) => {
            warn!("Skipping malformed claim record: {}", e);
            None
        }
    }
}

/// The one reconciliation path: upsert and tell listeners what changed.
///
/// An own confirmed claim pushed out by an earlier write is reported as
/// [`SessionEvent::SlotTaken`], like a displaced local claim.
pub(crate) fn fold(
    store: &mut OccupancyStore,
    claim: Claim,
    events: &broadcast::Sender<SessionEvent>,
) -> UpsertOutcome {
    let outcome = store.upsert(claim.clone());
    let event = match &outcome {
        UpsertOutcome::Replaced { previous } if store.disown(previous) => {
            warn!("Own claim {:?} on slot {} lost to {:?}", previous.id, claim.slot, claim.id);
            Some(SessionEvent::SlotTaken {
                slot: claim.slot,
                local: previous.clone(),
                winner: Some(claim),
            })
        }
        UpsertOutcome::Inserted | UpsertOutcome::Replaced { .. } => {
            Some(SessionEvent::ClaimAdded { claim })
        }
        UpsertOutcome::Confirmed => Some(SessionEvent::ClaimConfirmed { claim }),
        UpsertOutcome::Displaced { local } => Some(SessionEvent::SlotTaken {
            slot: claim.slot,
            local: local.clone(),
            winner: Some(claim),
        }),
        UpsertOutcome::Unchanged => None,
    };
    if let Some(event) = event {
        // Nobody listening is fine.
        let _ = events.send(event);
    }
    outcome
}

/// Bound a claims store request by the configured timeout.
pub(crate) async fn bounded<T>(
    config: &BoardConfig,
    request: impl Future<Output = std::result::Result<T, ServiceError>>,
) -> Result<T> {
    match tokio::time::timeout(config.request_timeout, request).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(config.request_timeout)),
    }
}

/// Keeps an [`OccupancyStore`] in step with a claims store.
pub struct ClaimSynchronizer<S: ClaimsService> {
    service: Arc<S>,
    store: SharedStore,
    config: Arc<BoardConfig>,
    board: BoardGeometry,
    state: watch::Sender<SyncState>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: ClaimsService> ClaimSynchronizer<S> {
    /// Create a synchronizer in the `Uninitialized` state.
    pub fn new(
        service: Arc<S>,
        store: SharedStore,
        config: Arc<BoardConfig>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        let board = config.geometry()?;
        let (state, _) = watch::channel(SyncState::Uninitialized);
        Ok(Self {
            service,
            store,
            config,
            board,
            state,
            events,
        })
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SyncState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!("Claim sync {} -> {}", prev, next);
            let _ = self.events.send(SessionEvent::SyncStateChanged { state: next });
        }
    }

    /// Read every stored claim and fold it in.
    ///
    /// Returns how many claims changed the store.
    pub async fn bootstrap(&self) -> Result<usize> {
        let records = bounded(&self.config, self.service.read_all()).await?;
        let total = records.len();
        let claims: Vec<Claim> = records
            .into_iter()
            .filter_map(|record| decode(record, &self.board))
            .collect();

        let mut store = self.store.write().await;
        let mut changed = 0;
        for claim in claims {
            if fold(&mut store, claim, &self.events).is_change() {
                changed += 1;
            }
        }
        info!(
            "Bootstrap read {} claims, {} changed the board ({} occupied)",
            total,
            changed,
            store.len()
        );
        Ok(changed)
    }

    /// Fold one feed record.
    ///
    /// `None` when the record was malformed or off the board.
    pub async fn apply(&self, record: ClaimRecord) -> Option<UpsertOutcome> {
        let claim = decode(record, &self.board)?;
        let mut store = self.store.write().await;
        Some(fold(&mut store, claim, &self.events))
    }

    /// Drive the state machine until `cancel` fires.
    ///
    /// The live feed is released before this returns, whatever the exit.
    pub async fn run(&self, cancel: CancellationToken) {
        self.set_state(SyncState::Bootstrapping);
        let mut heal = true;

        loop {
            let feed = tokio::select! {
                _ = cancel.cancelled() => None,
                feed = self.connect(heal) => Some(feed),
            };
            let Some(mut feed) = feed else { break };
            self.set_state(SyncState::Live);

            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = self.follow(&mut feed) => false,
            };
            feed.unsubscribe();
            if cancelled {
                break;
            }

            warn!("Live feed {} disconnected, reconnecting", feed.id());
            self.set_state(SyncState::Reconnecting);
            heal = self.config.heal_on_reconnect;
        }

        self.set_state(SyncState::Closed);
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self) -> SyncHandle {
        let cancel = CancellationToken::new();
        let state = self.watch();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SyncHandle {
            cancel,
            task: Some(task),
            state,
        }
    }

    async fn follow(&self, feed: &mut Subscription) {
        while let Some(record) = feed.recv().await {
            self.apply(record).await;
        }
    }

    /// Open the feed and, when `heal` is set, read the board.
    /// Retries with backoff until both succeed.
    async fn connect(&self, heal: bool) -> Subscription {
        let mut feed: Option<Subscription> = None;
        let mut synced = !heal;
        let mut attempt = 0u32;

        loop {
            if feed.is_none() {
                match bounded(&self.config, self.service.subscribe_inserts()).await {
                    Ok(sub) => {
                        debug!("Live feed {} open", sub.id());
                        feed = Some(sub);
                    }
                    Err(e) => warn!("Failed to open live feed: {}", e),
                }
            }
            if !synced {
                let feed_open = feed.is_some();
                match self.bootstrap().await {
                    // Without the feed this read only fills the board early.
                    Ok(_) => synced = feed_open,
                    Err(e) => warn!("Bootstrap read failed: {}", e),
                }
            }
            if synced {
                if let Some(feed) = feed.take() {
                    return feed;
                }
            }

            let delay = self.config.backoff(attempt);
            attempt = attempt.saturating_add(1);
            debug!("Claim sync retry {} in {:?}", attempt, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Owner of a running synchronizer task.
///
/// [`shutdown`](Self::shutdown) stops the task and waits for the feed to be
/// released. Dropping the handle cancels and aborts the task, which also
/// drops (and so releases) the feed.
#[derive(Debug)]
pub struct SyncHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<SyncState>,
}

impl SyncHandle {
    /// Current state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Stop the synchronizer and wait for it to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Subscription(format!("synchronizer task failed: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
