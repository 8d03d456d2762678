//! Optimistic claim submission.
//!
//! A claim is checked locally, written to the occupancy store at once, and
//! then persisted in the background. The claims store has the last word:
//! its response confirms the local copy, or, on a uniqueness conflict, the
//! local copy is rolled back. A store without uniqueness may accept the
//! claim while an earlier write holds the slot; that is a conflict too.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use wishtree_store::{Claim, ColorTag, OccupancyStore, SlotCoord};
use wishtree_topology::BoardGeometry;

use crate::config::BoardConfig;
use crate::error::{Error, Result, ServiceError, ValidationError};
use crate::events::SessionEvent;
use crate::service::ClaimsService;
use crate::synchronizer::{bounded, decode, fold, SharedStore};

/// Validates and applies local claims, then forwards them to the claims store.
pub struct ClaimSubmitter<S: ClaimsService> {
    service: Arc<S>,
    store: SharedStore,
    config: Arc<BoardConfig>,
    board: BoardGeometry,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: ClaimsService> Clone for ClaimSubmitter<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            board: self.board,
            events: self.events.clone(),
        }
    }
}

impl<S: ClaimsService> ClaimSubmitter<S> {
    pub fn new(
        service: Arc<S>,
        store: SharedStore,
        config: Arc<BoardConfig>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        let board = config.geometry()?;
        Ok(Self {
            service,
            store,
            config,
            board,
            events,
        })
    }

    /// Check the input and normalize it into `(message, author)`.
    ///
    /// The message is trimmed and must fit `max_message_len`. The author is
    /// trimmed, cut to `max_author_len`, and replaced by the anonymous label
    /// when blank. Occupancy is not checked here.
    pub fn prepare(
        &self,
        slot: SlotCoord,
        message: &str,
        author: &str,
    ) -> std::result::Result<(String, String), ValidationError> {
        self.board.check(slot)?;

        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let len = message.chars().count();
        if len > self.config.max_message_len {
            return Err(ValidationError::MessageTooLong {
                len,
                max: self.config.max_message_len,
            });
        }

        let author = author.trim();
        let author = if author.is_empty() {
            self.config.anonymous_label.clone()
        } else {
            author.chars().take(self.config.max_author_len).collect()
        };

        Ok((message.to_string(), author))
    }

    /// Claim `slot` and persist it in the background.
    ///
    /// Returns the unconfirmed local claim as soon as it is on the board.
    pub async fn submit(&self, slot: SlotCoord, message: &str, author: &str) -> Result<Claim> {
        let claim = self.apply_local(slot, message, author).await?;

        let submitter = self.clone();
        let pending = claim.clone();
        tokio::spawn(async move {
            // Outcome is reported through session events.
            let _ = submitter.persist(pending).await;
        });

        Ok(claim)
    }

    /// Claim `slot` and wait for the claims store to answer.
    ///
    /// The local claim is applied first, exactly as [`submit`](Self::submit)
    /// does; the result is whatever [`persist`](Self::persist) returns.
    pub async fn submit_and_wait(
        &self,
        slot: SlotCoord,
        message: &str,
        author: &str,
    ) -> Result<Claim> {
        let claim = self.apply_local(slot, message, author).await?;
        self.persist(claim).await
    }

    async fn apply_local(&self, slot: SlotCoord, message: &str, author: &str) -> Result<Claim> {
        let (message, author) = self.prepare(slot, message, author)?;
        let color = ColorTag::pick(&self.config.palette, &mut rand::thread_rng());
        let claim = Claim::unconfirmed(slot, message, author, color);

        {
            let mut store = self.store.write().await;
            if store.has(claim.key()) {
                debug!("Rejected claim on occupied slot {}", slot);
                return Err(ValidationError::SlotOccupied(claim.key()).into());
            }
            fold(&mut store, claim.clone(), &self.events);
        }

        info!("Claimed slot {} for {} ({})", slot, claim.author, claim.color);
        Ok(claim)
    }

    /// Write `local` to the claims store and fold the answer in.
    ///
    /// - success: the stored claim replaces the local copy
    /// - conflict, or stored but an earlier write holds the slot: the local
    ///   copy is withdrawn if still on the board, and
    ///   [`SessionEvent::SlotTaken`] is published unless the board already
    ///   reported the loss
    /// - anything else: the local copy stays, and
    ///   [`SessionEvent::PersistFailed`] is published
    pub async fn persist(&self, local: Claim) -> Result<Claim> {
        match bounded(&self.config, self.service.create(local.to_record())).await {
            Ok(stored) => {
                let Some(confirmed) = decode(stored, &self.board) else {
                    let err = Error::Persistence(ServiceError::Unavailable(
                        "claims store answered with an unusable record".into(),
                    ));
                    self.report_failure(&local, &err);
                    return Err(err);
                };
                let mut store = self.store.write().await;
                fold(&mut store, confirmed.clone(), &self.events);
                let holder = store.get(confirmed.key()).and_then(|claim| claim.id);
                if holder == confirmed.id {
                    debug!("Claim at {} confirmed as {:?}", confirmed.slot, confirmed.id);
                    return Ok(confirmed);
                }
                warn!(
                    "Claim {:?} at {} stored, but {:?} was written first",
                    confirmed.id, confirmed.slot, holder
                );
                self.settle_loss(&mut store, local);
                Err(ServiceError::Conflict(confirmed.slot).into())
            }
            Err(Error::Persistence(ServiceError::Conflict(slot))) => {
                let mut store = self.store.write().await;
                self.settle_loss(&mut store, local);
                Err(ServiceError::Conflict(slot).into())
            }
            Err(e) => {
                self.report_failure(&local, &e);
                Err(e)
            }
        }
    }

    /// Withdraw a local claim that lost its slot and publish
    /// [`SessionEvent::SlotTaken`] if nobody has yet.
    ///
    /// A winner that confirmed the local claim (same text, author and color)
    /// was taken for ours; it is disowned here.
    fn settle_loss(&self, store: &mut OccupancyStore, local: Claim) {
        let slot = local.slot;
        if let Some(local) = store.retract_unconfirmed(local.key(), &local) {
            warn!("Slot {} was claimed first elsewhere, withdrew local claim", slot);
            let _ = self.events.send(SessionEvent::SlotTaken {
                slot,
                local,
                winner: None,
            });
            return;
        }
        let Some(winner) = store.get(local.key()).cloned() else {
            return;
        };
        if store.disown(&winner) {
            warn!("Slot {} went to an identical wish {:?}", slot, winner.id);
            let _ = self.events.send(SessionEvent::SlotTaken {
                slot,
                local,
                winner: Some(winner),
            });
        }
    }

    fn report_failure(&self, local: &Claim, err: &Error) {
        warn!("Failed to persist claim at {}: {}", local.slot, err);
        let _ = self.events.send(SessionEvent::PersistFailed {
            slot: local.slot,
            reason: err.to_string(),
        });
    }
}
