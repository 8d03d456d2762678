//! Claim records.
//!
//! A [`Claim`] is one wish hung on one slot. The optimistic local copy has
//! no id; the copy that comes back from the claims store does. Both refer
//! to the same logical wish.
//!
//! [`ClaimRecord`] is the shape the claims store speaks (flat `grid_row` /
//! `grid_col` columns, free-form color text). Conversion into a `Claim` is
//! the one place where stored data is checked and normalized.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wishtree_topology::{SlotCoord, SlotKey, MAX_ROW};

use crate::RecordError;

/// Identifier assigned by the claims store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub u64);

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ornament color of a claimed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Red,
    Yellow,
    Blue,
    Green,
    Purple,
    Pink,
    Orange,
    Emerald,
    Rose,
    Teal,
    Fuchsia,
}

impl ColorTag {
    /// The full palette, in display order.
    pub const ALL: [Self; 11] = [
        Self::Red,
        Self::Yellow,
        Self::Blue,
        Self::Green,
        Self::Purple,
        Self::Pink,
        Self::Orange,
        Self::Emerald,
        Self::Rose,
        Self::Teal,
        Self::Fuchsia,
    ];

    /// Substitute for any stored tag outside the palette.
    pub const DEFAULT: Self = Self::Green;

    /// Lowercase tag name as stored.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Orange => "orange",
            Self::Emerald => "emerald",
            Self::Rose => "rose",
            Self::Teal => "teal",
            Self::Fuchsia => "fuchsia",
        }
    }

    /// Parse a stored tag, substituting [`ColorTag::DEFAULT`] for anything
    /// outside the palette.
    pub fn from_stored(tag: &str) -> Self {
        tag.parse().unwrap_or_else(|_| {
            debug!("Color tag {:?} outside palette, using {}", tag, Self::DEFAULT);
            Self::DEFAULT
        })
    }

    /// Uniformly pick a tag from `palette`.
    ///
    /// An empty palette yields [`ColorTag::DEFAULT`].
    pub fn pick<R: Rng + ?Sized>(palette: &[Self], rng: &mut R) -> Self {
        palette.choose(rng).copied().unwrap_or(Self::DEFAULT)
    }
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorTag {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| RecordError::UnknownColor(s.to_string()))
    }
}

/// A wish hung on one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Assigned by the claims store; `None` on the optimistic local copy
    pub id: Option<ClaimId>,
    /// Where the wish hangs
    pub slot: SlotCoord,
    /// The wish itself
    pub message: String,
    /// Who made it
    pub author: String,
    /// Ornament color
    pub color: ColorTag,
}

impl Claim {
    /// Create an unconfirmed (local) claim.
    pub fn unconfirmed(
        slot: SlotCoord,
        message: impl Into<String>,
        author: impl Into<String>,
        color: ColorTag,
    ) -> Self {
        Self {
            id: None,
            slot,
            message: message.into(),
            author: author.into(),
            color,
        }
    }

    /// Attach the store-assigned id.
    pub fn confirmed(mut self, id: ClaimId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether this claim came back from the claims store.
    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    /// Canonical key of the claimed slot.
    #[inline]
    pub fn key(&self) -> SlotKey {
        self.slot.key()
    }

    /// Whether `other` is the same wish, ignoring confirmation state.
    ///
    /// Color is compared too: it is picked at random per claim, so two
    /// anonymous clients writing the same text rarely match on it.
    pub fn same_wish(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.message == other.message
            && self.author == other.author
            && self.color == other.color
    }

    /// Wire shape for the claims store.
    pub fn to_record(&self) -> ClaimRecord {
        ClaimRecord::from(self)
    }
}

/// Claim as the claims store persists it.
///
/// Unknown columns in incoming rows are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub message: String,
    pub author: String,
    pub color: String,
    pub grid_row: i64,
    pub grid_col: i64,
}

impl From<&Claim> for ClaimRecord {
    fn from(claim: &Claim) -> Self {
        Self {
            id: claim.id.map(|id| id.0),
            message: claim.message.clone(),
            author: claim.author.clone(),
            color: claim.color.as_str().to_string(),
            grid_row: claim.slot.row as i64,
            grid_col: claim.slot.col as i64,
        }
    }
}

impl TryFrom<ClaimRecord> for Claim {
    type Error = RecordError;

    fn try_from(record: ClaimRecord) -> Result<Self, Self::Error> {
        let row = u32::try_from(record.grid_row)
            .ok()
            .filter(|row| (1..=MAX_ROW).contains(row))
            .ok_or(RecordError::InvalidRow(record.grid_row))?;
        let col = i32::try_from(record.grid_col)
            .map_err(|_| RecordError::InvalidColumn(record.grid_col))?;

        Ok(Self {
            id: record.id.map(ClaimId),
            slot: SlotCoord::new(row, col),
            color: ColorTag::from_stored(&record.color),
            message: record.message,
            author: record.author,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(row: i64, col: i64, color: &str) -> ClaimRecord {
        ClaimRecord {
            id: Some(7),
            message: "peace".into(),
            author: "Ann".into(),
            color: color.into(),
            grid_row: row,
            grid_col: col,
        }
    }

    #[test]
    fn palette_has_eleven_distinct_tags() {
        let names: std::collections::HashSet<_> =
            ColorTag::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), 11);
        for tag in ColorTag::ALL {
            assert_eq!(tag.as_str().parse::<ColorTag>().unwrap(), tag);
        }
    }

    #[test]
    fn stored_color_outside_palette_falls_back_once() {
        assert_eq!(ColorTag::from_stored("teal"), ColorTag::Teal);
        assert_eq!(ColorTag::from_stored("text-red-500"), ColorTag::DEFAULT);
        assert_eq!(ColorTag::from_stored(""), ColorTag::DEFAULT);
        assert!("Red".parse::<ColorTag>().is_err());
    }

    #[test]
    fn pick_stays_in_palette() {
        let mut rng = StdRng::seed_from_u64(42);
        let palette = [ColorTag::Rose, ColorTag::Teal];
        for _ in 0..100 {
            assert!(palette.contains(&ColorTag::pick(&palette, &mut rng)));
        }
        assert_eq!(ColorTag::pick(&[], &mut rng), ColorTag::DEFAULT);
    }

    #[test]
    fn record_converts_to_claim() {
        let claim = Claim::try_from(record(2, -1, "blue")).unwrap();
        assert_eq!(claim.id, Some(ClaimId(7)));
        assert_eq!(claim.slot, SlotCoord::new(2, -1));
        assert_eq!(claim.color, ColorTag::Blue);
        assert!(claim.is_confirmed());
    }

    #[test]
    fn record_with_bad_coordinates_is_rejected() {
        assert_eq!(
            Claim::try_from(record(0, 0, "red")),
            Err(RecordError::InvalidRow(0))
        );
        assert_eq!(
            Claim::try_from(record(-3, 0, "red")),
            Err(RecordError::InvalidRow(-3))
        );
        assert_eq!(
            Claim::try_from(record(3, i64::MAX, "red")),
            Err(RecordError::InvalidColumn(i64::MAX))
        );
    }

    #[test]
    fn unknown_record_fields_are_ignored() {
        let json = r#"{
            "id": 3,
            "message": "joy",
            "author": "Bo",
            "color": "pink",
            "grid_row": 4,
            "grid_col": 3,
            "created_at": "2024-12-24T00:00:00Z",
            "likes": 12
        }"#;
        let record: ClaimRecord = serde_json::from_str(json).unwrap();
        let claim = Claim::try_from(record).unwrap();
        assert_eq!(claim.slot, SlotCoord::new(4, 3));
        assert_eq!(claim.color, ColorTag::Pink);
    }

    #[test]
    fn unconfirmed_record_omits_id() {
        let claim = Claim::unconfirmed(SlotCoord::new(3, 0), "peace", "Ann", ColorTag::Red);
        let json = serde_json::to_value(claim.to_record()).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["grid_row"], 3);
        assert_eq!(json["color"], "red");
    }

    #[test]
    fn same_wish_ignores_id_only() {
        let local = Claim::unconfirmed(SlotCoord::new(3, 0), "peace", "Ann", ColorTag::Red);
        let mut remote = local.clone().confirmed(ClaimId(1));
        assert!(local.same_wish(&remote));

        remote.color = ColorTag::Green;
        assert!(!local.same_wish(&remote));

        remote.color = ColorTag::Red;
        remote.author = "Bo".into();
        assert!(!local.same_wish(&remote));
    }
}
