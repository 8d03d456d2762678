//! Board enumeration: which rows exist and which columns each row holds.
//!
//! Row `r` holds `2r - 1` slots, so the first `n` rows hold `n²` slots.
//! Enumeration is row-major, apex first, columns left to right:
//!
//! - Row 1: `[0]`
//! - Row 2: `[-1, 0, 1]`
//! - Row n: `[-(n-1), ..., n-1]`

use crate::{Result, SlotCoord, TopologyError};

/// Largest row whose column offsets still fit in an `i32`.
pub const MAX_ROW: u32 = i32::MAX as u32;

/// Number of slots in row `row`.
///
/// - Row 0: 0 slots (not part of any board)
/// - Row n > 0: `2n - 1` slots
#[inline]
pub const fn slots_in_row(row: u32) -> u64 {
    if row == 0 {
        0
    } else {
        2 * row as u64 - 1
    }
}

/// Total slots in rows `1..=row`.
///
/// Formula: `row²`
#[inline]
pub const fn total_slots_through_row(row: u32) -> u64 {
    row as u64 * row as u64
}

/// Number of addressable rows on a board of `board_size`.
///
/// Rows run `1..board_size`, so a size of 0 or 1 yields an empty board.
#[inline]
pub const fn row_count(board_size: u32) -> u32 {
    board_size.saturating_sub(1)
}

/// Column offsets of `row`, strictly increasing and symmetric around zero.
///
/// Rows outside `1..=MAX_ROW` yield no columns.
pub fn cols_for_row(row: u32) -> RowCols {
    if row == 0 || row > MAX_ROW {
        return RowCols::EMPTY;
    }
    let half = (row - 1) as i32;
    RowCols {
        next: -(half as i64),
        end: half as i64 + 1,
    }
}

/// Iterator over the column offsets of one row.
#[derive(Debug, Clone)]
pub struct RowCols {
    next: i64,
    end: i64,
}

impl RowCols {
    const EMPTY: Self = Self { next: 0, end: 0 };
}

impl Iterator for RowCols {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let col = self.next as i32;
        self.next += 1;
        Some(col)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next).max(0) as usize;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for RowCols {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.end as i32)
    }
}

impl ExactSizeIterator for RowCols {}

/// A board of a fixed size.
///
/// All bounds checks against the configured height live here; the free
/// functions above are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardGeometry {
    size: u32,
}

impl BoardGeometry {
    /// Create a board whose rows run `1..size`.
    pub fn new(size: u32) -> Result<Self> {
        if size > MAX_ROW {
            return Err(TopologyError::BoardTooLarge(size));
        }
        Ok(Self { size })
    }

    /// Configured board size (one past the last row).
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Number of rows on the board.
    #[inline]
    pub const fn row_count(&self) -> u32 {
        row_count(self.size)
    }

    /// Row indices, apex first.
    pub fn rows(&self) -> std::ops::Range<u32> {
        1..self.size.max(1)
    }

    /// Total number of slots on the board.
    pub const fn slot_count(&self) -> u64 {
        total_slots_through_row(self.row_count())
    }

    /// Whether `row` is on this board.
    #[inline]
    pub fn has_row(&self, row: u32) -> bool {
        row >= 1 && row < self.size
    }

    /// Column offsets of `row`, or an error when the row is off the board.
    pub fn cols(&self, row: u32) -> Result<RowCols> {
        if !self.has_row(row) {
            return Err(TopologyError::RowOutOfBounds {
                row,
                board_size: self.size,
            });
        }
        Ok(cols_for_row(row))
    }

    /// Whether `coord` names a slot on this board.
    pub fn contains(&self, coord: SlotCoord) -> bool {
        self.has_row(coord.row) && coord.in_row()
    }

    /// Check that `coord` names a slot on this board.
    pub fn check(&self, coord: SlotCoord) -> Result<()> {
        if !self.has_row(coord.row) {
            return Err(TopologyError::RowOutOfBounds {
                row: coord.row,
                board_size: self.size,
            });
        }
        if !coord.in_row() {
            return Err(TopologyError::ColumnOutOfBounds { coord });
        }
        Ok(())
    }

    /// Iterate every slot on the board in row-major order.
    pub fn slots(&self) -> Board {
        Board::new(*self)
    }
}

/// Row-major iterator over every slot of a board.
#[derive(Debug, Clone)]
pub struct Board {
    rows: std::ops::Range<u32>,
    row: u32,
    cols: RowCols,
    remaining: u64,
}

impl Board {
    fn new(geometry: BoardGeometry) -> Self {
        Self {
            rows: geometry.rows(),
            row: 0,
            cols: RowCols::EMPTY,
            remaining: geometry.slot_count(),
        }
    }
}

impl Iterator for Board {
    type Item = SlotCoord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(col) = self.cols.next() {
                self.remaining -= 1;
                return Some(SlotCoord::new(self.row, col));
            }
            self.row = self.rows.next()?;
            self.cols = cols_for_row(self.row);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, usize::try_from(self.remaining).ok())
    }
}
