//! Wishtree Board Topology
//!
//! Triangular slot geometry for the wishing tree board.
//!
//! # Geometry
//!
//! The board is a stack of rows. Row `r` (starting at 1) holds `2r - 1`
//! slots whose column offsets are centered on zero:
//!
//! ```text
//! row 1:           0
//! row 2:       -1  0  1
//! row 3:    -2 -1  0  1  2
//! ```
//!
//! A board of size `R` holds rows `1..R`, so `R - 1` rows and `(R - 1)²`
//! slots in total. A board of size 0 or 1 is empty.
//!
//! # Slot Keys
//!
//! Every `(row, col)` pair maps to a [`SlotKey`]. The mapping is pure and
//! injective, and the key's textual form (`"row-col"`) is stable across
//! restarts, so claims stored by position stay addressable after reload.

mod board;
mod error;
mod slot;

pub use board::{
    cols_for_row, row_count, slots_in_row, total_slots_through_row, Board, BoardGeometry,
    RowCols, MAX_ROW,
};
pub use error::{Result, TopologyError};
pub use slot::{slot_key, SlotCoord, SlotKey};

/// Default board size: rows run 1..=39.
pub const DEFAULT_BOARD_SIZE: u32 = 40;

// The default board must be able to hold at least the apex slot.
const _: () = assert!(DEFAULT_BOARD_SIZE > 1);
