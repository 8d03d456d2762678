//! Slot coordinates and canonical slot keys.
//!
//! A slot is addressed by `(row, col)`: rows count down from the apex
//! starting at 1, and columns are signed offsets from the tree's center
//! line. The key packs both halves into one `u64`, which makes it cheap to
//! hash and order while staying a bijection over every valid pair.

use std::fmt;
use std::str::FromStr;

use crate::TopologyError;

/// A position on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotCoord {
    /// Row, 1 at the apex
    pub row: u32,
    /// Column offset from the center line
    pub col: i32,
}

impl SlotCoord {
    /// The single slot of the first row.
    pub const APEX: Self = Self { row: 1, col: 0 };

    /// Create a new coordinate.
    pub const fn new(row: u32, col: i32) -> Self {
        Self { row, col }
    }

    /// Canonical key for this slot.
    #[inline]
    pub const fn key(&self) -> SlotKey {
        SlotKey::from_coord(*self)
    }

    /// Whether the column fits the triangular shape of its row.
    ///
    /// Row 0 holds no columns at all.
    pub fn in_row(&self) -> bool {
        self.row > 0 && (self.col.unsigned_abs() as u64) < self.row as u64
    }
}

impl fmt::Display for SlotCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(u32, i32)> for SlotCoord {
    fn from((row, col): (u32, i32)) -> Self {
        Self { row, col }
    }
}

/// Canonical, stable key for a slot.
///
/// The row occupies the high 32 bits and the column's two's-complement
/// bits the low 32, so two distinct coordinates never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotKey(u64);

impl SlotKey {
    /// Pack a coordinate into a key.
    #[inline]
    pub const fn from_coord(coord: SlotCoord) -> Self {
        Self(((coord.row as u64) << 32) | (coord.col as u32 as u64))
    }

    /// Recover the coordinate this key was built from.
    #[inline]
    pub const fn coord(&self) -> SlotCoord {
        SlotCoord {
            row: (self.0 >> 32) as u32,
            col: self.0 as u32 as i32,
        }
    }

    /// Raw packed value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<SlotCoord> for SlotKey {
    fn from(coord: SlotCoord) -> Self {
        Self::from_coord(coord)
    }
}

impl From<SlotKey> for SlotCoord {
    fn from(key: SlotKey) -> Self {
        key.coord()
    }
}

/// Textual form is `row-col`, e.g. `3-0` or `2--1`.
impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coord = self.coord();
        write!(f, "{}-{}", coord.row, coord.col)
    }
}

impl FromStr for SlotKey {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Rows are unsigned, so the first '-' always separates the halves.
        let malformed = || TopologyError::MalformedKey(s.to_string());
        let (row, col) = s.split_once('-').ok_or_else(malformed)?;
        let row = row.parse::<u32>().map_err(|_| malformed())?;
        let col = col.parse::<i32>().map_err(|_| malformed())?;
        Ok(slot_key(row, col))
    }
}

/// Canonical key for `(row, col)`.
#[inline]
pub const fn slot_key(row: u32, col: i32) -> SlotKey {
    SlotKey::from_coord(SlotCoord::new(row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_round_trips_negative_columns() {
        let coord = SlotCoord::new(2, -1);
        assert_eq!(coord.key().coord(), coord);
        assert_eq!(slot_key(2, -1), coord.key());
    }

    #[test]
    fn display_matches_row_dash_col() {
        assert_eq!(slot_key(3, 0).to_string(), "3-0");
        assert_eq!(slot_key(2, -1).to_string(), "2--1");
        assert_eq!(slot_key(39, 38).to_string(), "39-38");
    }

    #[test]
    fn parse_accepts_display_form() {
        for key in [slot_key(1, 0), slot_key(2, -1), slot_key(17, 16)] {
            assert_eq!(key.to_string().parse::<SlotKey>().unwrap(), key);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "3", "x-1", "3-y", "-1-0", "3-0-"] {
            assert!(bad.parse::<SlotKey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn in_row_follows_triangle() {
        assert!(SlotCoord::APEX.in_row());
        assert!(!SlotCoord::new(1, 1).in_row());
        assert!(SlotCoord::new(3, -2).in_row());
        assert!(!SlotCoord::new(3, 3).in_row());
        assert!(!SlotCoord::new(0, 0).in_row());
    }

    proptest! {
        #[test]
        fn distinct_coords_never_collide(
            a in (any::<u32>(), any::<i32>()),
            b in (any::<u32>(), any::<i32>()),
        ) {
            let ka = slot_key(a.0, a.1);
            let kb = slot_key(b.0, b.1);
            prop_assert_eq!(a == b, ka == kb);
        }

        #[test]
        fn key_is_stable_and_invertible(row in 1u32..10_000, col in -9_999i32..10_000) {
            let first = slot_key(row, col);
            let second = slot_key(row, col);
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.coord(), SlotCoord::new(row, col));
            prop_assert_eq!(first.to_string().parse::<SlotKey>().unwrap(), first);
        }
    }
}
