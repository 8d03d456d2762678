//! Error types for wishtree-store.

use thiserror::Error;

/// Result type for record conversion.
pub type Result<T> = std::result::Result<T, RecordError>;

/// A persisted record that cannot become a [`Claim`](crate::Claim).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Row is negative, zero, or too large to address.
    #[error("record row {0} is not a valid board row")]
    InvalidRow(i64),

    /// Column does not fit a signed 32-bit offset.
    #[error("record column {0} is not a valid column offset")]
    InvalidColumn(i64),

    /// Color tag is not part of the palette.
    #[error("unknown color tag: {0:?}")]
    UnknownColor(String),
}
