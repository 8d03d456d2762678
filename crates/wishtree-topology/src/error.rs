//! Error types for wishtree-topology.

use thiserror::Error;

use crate::SlotCoord;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors raised when a position falls outside the board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Row is zero or past the last row of the board.
    #[error("row {row} is outside the board (rows 1..{board_size})")]
    RowOutOfBounds { row: u32, board_size: u32 },

    /// Column offset is wider than the row allows.
    #[error("column {} is outside row {} (|col| must be < {})", .coord.col, .coord.row, .coord.row)]
    ColumnOutOfBounds { coord: SlotCoord },

    /// Board size cannot be represented with signed column offsets.
    #[error("board size {0} exceeds the maximum supported size")]
    BoardTooLarge(u32),

    /// Slot key text did not parse as `row-col`.
    #[error("malformed slot key: {0:?}")]
    MalformedKey(String),
}
