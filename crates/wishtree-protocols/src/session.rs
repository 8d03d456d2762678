//! One viewer's session on the board.
//!
//! A [`Session`] owns the occupancy store and hands the same handle to its
//! synchronizer task and its submitter. The board is interactive from the
//! moment [`Session::start`] returns; bootstrap runs in the background.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::info;
use wishtree_store::{Claim, OccupancyStore, SlotCoord, SlotKey};
use wishtree_topology::BoardGeometry;

use crate::config::BoardConfig;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::service::ClaimsService;
use crate::submitter::ClaimSubmitter;
use crate::synchronizer::{ClaimSynchronizer, SharedStore, SyncHandle, SyncState};

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 256;

/// One slot as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub col: i32,
    pub key: String,
    /// `None` when the slot can still be claimed
    pub claim: Option<Claim>,
}

/// One row of the board, slots left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub row: u32,
    pub slots: Vec<SlotView>,
}

/// A running session.
pub struct Session<S: ClaimsService> {
    store: SharedStore,
    config: Arc<BoardConfig>,
    board: BoardGeometry,
    submitter: ClaimSubmitter<S>,
    events: broadcast::Sender<SessionEvent>,
    sync_state: watch::Receiver<SyncState>,
    sync: Option<SyncHandle>,
}

impl<S: ClaimsService> Session<S> {
    /// Build the store, spawn the synchronizer and return at once.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(service: Arc<S>, config: BoardConfig) -> Result<Self> {
        config.validate()?;
        let board = config.geometry()?;
        let config = Arc::new(config);
        let store: SharedStore = Arc::new(RwLock::new(OccupancyStore::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let synchronizer = ClaimSynchronizer::new(
            Arc::clone(&service),
            Arc::clone(&store),
            Arc::clone(&config),
            events.clone(),
        )?;
        let submitter = ClaimSubmitter::new(
            service,
            Arc::clone(&store),
            Arc::clone(&config),
            events.clone(),
        )?;

        let sync = synchronizer.spawn();
        let sync_state = sync.watch();
        info!(
            "Session started: {} rows, {} slots",
            board.row_count(),
            board.slot_count()
        );

        Ok(Self {
            store,
            config,
            board,
            submitter,
            events,
            sync_state,
            sync: Some(sync),
        })
    }

    /// Copy of every claim, keyed by slot.
    pub async fn snapshot(&self) -> HashMap<SlotKey, Claim> {
        self.store.read().await.snapshot()
    }

    /// Whether `key` holds a claim.
    pub async fn has(&self, key: SlotKey) -> bool {
        self.store.read().await.has(key)
    }

    /// The claim at `key`, for read-only display.
    pub async fn view(&self, key: SlotKey) -> Option<Claim> {
        self.store.read().await.get(key).cloned()
    }

    /// Claim `slot`; persistence continues in the background.
    pub async fn submit(&self, slot: SlotCoord, message: &str, author: &str) -> Result<Claim> {
        self.ensure_open()?;
        self.submitter.submit(slot, message, author).await
    }

    /// Claim `slot` and wait for the claims store's verdict.
    pub async fn submit_and_wait(
        &self,
        slot: SlotCoord,
        message: &str,
        author: &str,
    ) -> Result<Claim> {
        self.ensure_open()?;
        self.submitter.submit_and_wait(slot, message, author).await
    }

    /// Every row with every slot and its claim, if any.
    pub async fn rows(&self) -> Vec<RowView> {
        let store = self.store.read().await;
        self.board
            .rows()
            .map(|row| RowView {
                row,
                slots: wishtree_topology::cols_for_row(row)
                    .map(|col| {
                        let key = SlotCoord::new(row, col).key();
                        SlotView {
                            col,
                            key: key.to_string(),
                            claim: store.get(key).cloned(),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// Board geometry.
    pub fn board(&self) -> BoardGeometry {
        self.board
    }

    /// Configuration the session was started with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Current synchronizer state.
    pub fn sync_state(&self) -> SyncState {
        *self.sync_state.borrow()
    }

    /// Watch synchronizer state changes.
    pub fn watch_sync(&self) -> watch::Receiver<SyncState> {
        self.sync_state.clone()
    }

    /// Subscribe to session events from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the synchronizer and release the live feed.
    ///
    /// Claims already on the board stay readable.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(sync) = self.sync.take() {
            sync.shutdown().await?;
            info!("Session closed");
        }
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.sync.is_none()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClaims;

    #[tokio::test]
    async fn rows_cover_the_board() {
        let config = BoardConfig {
            board_size: 4,
            ..BoardConfig::default()
        };
        let session = Session::start(Arc::new(MemoryClaims::new()), config).unwrap();
        let rows = session.rows().await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].slots.len(), 1);
        assert_eq!(rows[2].slots.len(), 5);
        assert_eq!(rows[2].slots[0].col, -2);
        assert_eq!(rows[2].slots[0].key, "3--2");
        assert!(rows.iter().flat_map(|r| &r.slots).all(|s| s.claim.is_none()));
    }

    #[tokio::test]
    async fn board_and_config_follow_start() {
        let config = BoardConfig {
            board_size: 6,
            anonymous_label: "Someone".into(),
            ..BoardConfig::default()
        };
        let session = Session::start(Arc::new(MemoryClaims::new()), config).unwrap();

        assert_eq!(session.board().size(), 6);
        assert_eq!(session.board().slot_count(), 25);
        assert_eq!(session.config().anonymous_label, "Someone");
        assert_eq!(session.config().board_size, session.board().size());
    }

    #[tokio::test]
    async fn rows_show_claims() {
        let session =
            Session::start(Arc::new(MemoryClaims::new()), BoardConfig::default()).unwrap();
        let claim = session.submit(SlotCoord::new(2, 1), "sun", "Hal").await.unwrap();

        let rows = session.rows().await;
        let slot = &rows[1].slots[2];
        assert_eq!(slot.col, 1);
        assert_eq!(slot.claim.as_ref().map(|c| &c.message), Some(&claim.message));
        assert_eq!(session.view(claim.key()).await.map(|c| c.slot), Some(claim.slot));
    }

    #[tokio::test]
    async fn invalid_config_is_refused() {
        let config = BoardConfig {
            max_message_len: 0,
            ..BoardConfig::default()
        };
        assert!(matches!(
            Session::start(Arc::new(MemoryClaims::new()), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn closed_session_refuses_claims() {
        let mut session =
            Session::start(Arc::new(MemoryClaims::new()), BoardConfig::default()).unwrap();
        session.shutdown().await.unwrap();
        session.shutdown().await.unwrap();

        assert!(session.is_closed());
        assert_eq!(session.sync_state(), SyncState::Closed);
        assert!(matches!(
            session.submit(SlotCoord::APEX, "late", "Ivy").await,
            Err(Error::Closed)
        ));
    }
}
