//! Wishtree occupancy state.
//!
//! Holds the claim data model and the [`OccupancyStore`], the single map
//! from slot key to claim that the presentation layer reads.
//!
//! Claims enter the store from three places (the optimistic local submit,
//! the bootstrap read, and the live feed) and all three go through
//! [`OccupancyStore::upsert`]. That one merge rule is what makes the board
//! converge regardless of arrival order.

mod claim;
mod error;
mod occupancy;

pub use claim::{Claim, ClaimId, ClaimRecord, ColorTag};
pub use error::{RecordError, Result};
pub use occupancy::{OccupancyStore, UpsertOutcome};

pub use wishtree_topology::{SlotCoord, SlotKey};
