//! Error types for wishtree-protocols.

use std::time::Duration;

use thiserror::Error;
use wishtree_store::{SlotCoord, SlotKey};
use wishtree_topology::TopologyError;

/// Result type for wishtree-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while syncing or submitting claims.
#[derive(Debug, Error)]
pub enum Error {
    /// Submission rejected before anything was mutated.
    #[error("invalid claim: {0}")]
    Validation(#[from] ValidationError),

    /// The claims store refused or failed a request.
    #[error("claims store error: {0}")]
    Persistence(#[from] ServiceError),

    /// The live feed could not be opened or kept open.
    #[error("live feed error: {0}")]
    Subscription(String),

    /// A claims store request did not finish in time.
    #[error("claims store request timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration values are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session has been shut down.
    #[error("session closed")]
    Closed,
}

impl Error {
    /// Whether this error means someone else got the slot first.
    pub fn is_slot_taken(&self) -> bool {
        matches!(
            self,
            Error::Validation(ValidationError::SlotOccupied(_))
                | Error::Persistence(ServiceError::Conflict(_))
        )
    }
}

/// Local input problems, caught before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Message is blank after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// Message exceeds the configured length.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    /// Slot already holds a claim.
    #[error("slot {0} is already taken")]
    SlotOccupied(SlotKey),

    /// Slot is not on the board.
    #[error("slot is not on the board: {0}")]
    OffBoard(#[from] TopologyError),
}

/// Failures reported by a [`ClaimsService`](crate::ClaimsService).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Service cannot be reached or refused the request.
    #[error("claims store unavailable: {0}")]
    Unavailable(String),

    /// Uniqueness constraint on the slot rejected the write.
    #[error("slot {0} was already claimed")]
    Conflict(SlotCoord),

    /// Live feed closed.
    #[error("live feed disconnected")]
    Disconnected,
}
