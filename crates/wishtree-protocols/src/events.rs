//! Session events for the presentation layer.

use serde::Serialize;
use wishtree_store::{Claim, SlotCoord};

use crate::synchronizer::SyncState;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A claim appeared on the board (bootstrap or live feed).
    ClaimAdded { claim: Claim },
    /// A local claim was confirmed by the claims store.
    ClaimConfirmed { claim: Claim },
    /// A local claim lost its slot to another claim.
    SlotTaken {
        slot: SlotCoord,
        local: Claim,
        winner: Option<Claim>,
    },
    /// A local claim could not be persisted; it stays visible locally only.
    PersistFailed { slot: SlotCoord, reason: String },
    /// The synchronizer changed state.
    SyncStateChanged { state: SyncState },
}
