//! Occupancy map: slot key → claim.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::{Claim, ClaimId, SlotKey};

/// What an [`OccupancyStore::upsert`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Slot was empty; the claim now occupies it.
    Inserted,
    /// The local unconfirmed copy was replaced by its confirmed counterpart.
    Confirmed,
    /// The local unconfirmed claim lost the slot to someone else's
    /// confirmed claim.
    Displaced { local: Claim },
    /// An earlier confirmed claim for the slot replaced a later one.
    Replaced { previous: Claim },
    /// Nothing changed.
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the store's observable state changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// The board's occupancy map.
///
/// Write-once per slot: a confirmed claim is never replaced by an
/// unconfirmed one, and an unconfirmed claim never replaces anything.
///
/// The store also remembers which confirmed claims took over a local
/// unconfirmed one, so a later loss of that slot can be told apart from
/// someone else's claim moving.
#[derive(Debug, Clone, Default)]
pub struct OccupancyStore {
    claims: HashMap<SlotKey, Claim>,
    own: HashSet<ClaimId>,
}

impl OccupancyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            claims: HashMap::new(),
            own: HashSet::new(),
        }
    }

    /// Owned copy of the current map, for rendering.
    pub fn snapshot(&self) -> HashMap<SlotKey, Claim> {
        self.claims.clone()
    }

    /// Whether `key` is occupied.
    #[inline]
    pub fn has(&self, key: SlotKey) -> bool {
        self.claims.contains_key(&key)
    }

    /// Claim at `key`, if any.
    pub fn get(&self, key: SlotKey) -> Option<&Claim> {
        self.claims.get(&key)
    }

    /// Fold a claim into the store under its slot key.
    ///
    /// Merge rules for an occupied slot:
    /// - incoming unconfirmed: ignored
    /// - existing unconfirmed, incoming confirmed: replaced
    /// - both confirmed: the lower id (the earlier write) stays
    ///
    /// Applying the same claim any number of times, in any order relative
    /// to other claims, leaves the same map.
    pub fn upsert(&mut self, claim: Claim) -> UpsertOutcome {
        let key = claim.key();
        let mut slot = match self.claims.entry(key) {
            Entry::Vacant(vacant) => {
                trace!("Slot {} filled by {:?}", key, claim.id);
                vacant.insert(claim);
                return UpsertOutcome::Inserted;
            }
            Entry::Occupied(occupied) => occupied,
        };

        let Some(incoming) = claim.id else {
            return UpsertOutcome::Unchanged;
        };

        match slot.get().id {
            None => {
                let local = slot.insert(claim);
                if local.same_wish(slot.get()) {
                    debug!("Slot {} confirmed as {}", key, incoming);
                    self.own.insert(incoming);
                    UpsertOutcome::Confirmed
                } else {
                    warn!("Local claim on slot {} displaced by {}", key, incoming);
                    UpsertOutcome::Displaced { local }
                }
            }
            Some(current) if incoming < current => {
                warn!(
                    "Slot {} held by {} but {} was written first, replacing",
                    key, current, incoming
                );
                let previous = slot.insert(claim);
                UpsertOutcome::Replaced { previous }
            }
            Some(_) => UpsertOutcome::Unchanged,
        }
    }

    /// Fold many claims; returns how many changed the store.
    pub fn extend<I: IntoIterator<Item = Claim>>(&mut self, claims: I) -> usize {
        claims
            .into_iter()
            .map(|claim| self.upsert(claim))
            .filter(UpsertOutcome::is_change)
            .count()
    }

    /// Remove the local claim at `key` if it is still unconfirmed and still
    /// the same wish as `expected`.
    ///
    /// Used to roll back an optimistic claim the claims store refused.
    /// Confirmed claims are never removed.
    pub fn retract_unconfirmed(&mut self, key: SlotKey, expected: &Claim) -> Option<Claim> {
        match self.claims.entry(key) {
            Entry::Occupied(slot)
                if !slot.get().is_confirmed() && slot.get().same_wish(expected) =>
            {
                debug!("Retracting unconfirmed claim on slot {}", key);
                Some(slot.remove())
            }
            _ => None,
        }
    }

    /// Whether `claim` confirmed a local claim of this store.
    pub fn is_own(&self, claim: &Claim) -> bool {
        claim.id.is_some_and(|id| self.own.contains(&id))
    }

    /// Stop treating `claim` as local. Returns whether it was.
    pub fn disown(&mut self, claim: &Claim) -> bool {
        claim.id.is_some_and(|id| self.own.remove(&id))
    }

    /// Iterate all claims.
    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &Claim)> {
        self.claims.iter()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Number of claims still waiting for confirmation.
    pub fn pending_count(&self) -> usize {
        self.claims.values().filter(|c| !c.is_confirmed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClaimId, ColorTag, SlotCoord};
    use proptest::prelude::*;

    fn local(row: u32, col: i32, message: &str, author: &str) -> Claim {
        Claim::unconfirmed(SlotCoord::new(row, col), message, author, ColorTag::Red)
    }

    #[test]
    fn insert_into_empty_slot() {
        let mut store = OccupancyStore::new();
        let claim = local(3, 0, "peace", "Ann");

        assert_eq!(store.upsert(claim.clone()), UpsertOutcome::Inserted);
        assert!(store.has(claim.key()));
        assert_eq!(store.get(claim.key()), Some(&claim));
    }

    #[test]
    fn confirmed_twice_is_idempotent() {
        let mut store = OccupancyStore::new();
        let claim = local(2, 1, "joy", "Bo").confirmed(ClaimId(5));

        store.upsert(claim.clone());
        let once = store.snapshot();
        assert_eq!(store.upsert(claim), UpsertOutcome::Unchanged);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn confirmation_replaces_local_copy() {
        let mut store = OccupancyStore::new();
        let pending = local(3, 0, "peace", "Ann");
        store.upsert(pending.clone());
        assert_eq!(store.pending_count(), 1);

        let confirmed = pending.clone().confirmed(ClaimId(9));
        assert_eq!(store.upsert(confirmed.clone()), UpsertOutcome::Confirmed);

        assert_eq!(store.len(), 1);
        let stored = store.get(pending.key()).unwrap();
        assert_eq!(stored.id, Some(ClaimId(9)));
        assert_eq!(stored.message, "peace");
        assert_eq!(stored.author, "Ann");
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn unconfirmed_never_regresses_confirmed() {
        let mut store = OccupancyStore::new();
        let confirmed = local(4, -2, "hope", "Cy").confirmed(ClaimId(1));
        store.upsert(confirmed.clone());

        let stale = local(4, -2, "hope", "Cy");
        assert_eq!(store.upsert(stale), UpsertOutcome::Unchanged);
        assert_eq!(store.get(confirmed.key()), Some(&confirmed));
    }

    #[test]
    fn local_claim_displaced_by_other_author() {
        let mut store = OccupancyStore::new();
        let mine = local(3, 0, "peace", "Ann");
        store.upsert(mine.clone());

        let theirs = local(3, 0, "joy", "Bo").confirmed(ClaimId(2));
        assert_eq!(
            store.upsert(theirs.clone()),
            UpsertOutcome::Displaced { local: mine }
        );
        assert_eq!(store.get(theirs.key()), Some(&theirs));
    }

    #[test]
    fn earliest_confirmed_claim_wins_either_order() {
        let first = local(5, 2, "a", "A").confirmed(ClaimId(10));
        let second = local(5, 2, "b", "B").confirmed(ClaimId(11));

        let mut forward = OccupancyStore::new();
        forward.upsert(first.clone());
        assert_eq!(forward.upsert(second.clone()), UpsertOutcome::Unchanged);

        let mut backward = OccupancyStore::new();
        backward.upsert(second.clone());
        assert_eq!(
            backward.upsert(first.clone()),
            UpsertOutcome::Replaced { previous: second }
        );

        assert_eq!(forward.snapshot(), backward.snapshot());
    }

    #[test]
    fn same_text_with_other_color_is_displaced() {
        let mut store = OccupancyStore::new();
        let mine = Claim::unconfirmed(SlotCoord::new(6, 0), "peace", "Anonymous", ColorTag::Teal);
        store.upsert(mine.clone());

        let theirs = Claim::unconfirmed(SlotCoord::new(6, 0), "peace", "Anonymous", ColorTag::Rose)
            .confirmed(ClaimId(4));
        assert_eq!(
            store.upsert(theirs.clone()),
            UpsertOutcome::Displaced { local: mine }
        );
        assert!(!store.is_own(&theirs));
    }

    #[test]
    fn confirmation_marks_claim_as_own() {
        let mut store = OccupancyStore::new();
        let pending = local(3, 0, "peace", "Ann");
        store.upsert(pending.clone());
        let confirmed = pending.confirmed(ClaimId(9));
        store.upsert(confirmed.clone());
        assert!(store.is_own(&confirmed));

        let elsewhere = local(4, 1, "joy", "Bo").confirmed(ClaimId(2));
        store.upsert(elsewhere.clone());
        assert!(!store.is_own(&elsewhere));

        assert!(store.disown(&confirmed));
        assert!(!store.disown(&confirmed));
        assert!(!store.is_own(&confirmed));
    }

    #[test]
    fn retract_only_touches_matching_unconfirmed() {
        let mut store = OccupancyStore::new();
        let mine = local(3, 0, "peace", "Ann");
        store.upsert(mine.clone());

        let other = local(3, 0, "joy", "Bo");
        assert_eq!(store.retract_unconfirmed(mine.key(), &other), None);
        assert_eq!(store.retract_unconfirmed(mine.key(), &mine), Some(mine.clone()));
        assert!(store.is_empty());

        let confirmed = mine.clone().confirmed(ClaimId(3));
        store.upsert(confirmed);
        assert_eq!(store.retract_unconfirmed(mine.key(), &mine), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn extend_counts_changes() {
        let mut store = OccupancyStore::new();
        let a = local(1, 0, "a", "A").confirmed(ClaimId(1));
        let b = local(2, -1, "b", "B").confirmed(ClaimId(2));
        assert_eq!(store.extend([a.clone(), b, a]), 2);
        assert_eq!(store.len(), 2);
    }

    fn arb_claim() -> impl Strategy<Value = Claim> {
        (1u32..6, any::<bool>(), 1u64..20).prop_map(|(row, confirmed, id)| {
            let col = (id % (2 * row as u64 - 1)) as i32 - (row as i32 - 1);
            // Text is tied to the id so one id always names one wish.
            let claim = local(row, col, &format!("wish {id}"), "someone");
            if confirmed {
                claim.confirmed(ClaimId(id))
            } else {
                claim
            }
        })
    }

    proptest! {
        #[test]
        fn final_state_is_order_independent(
            claims in prop::collection::vec(arb_claim(), 0..24)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let (original, permuted) = claims;

            // Only confirmed claims are folded in by the synchronizer; local
            // claims always land first on their own client.
            let confirmed = |v: &Vec<Claim>| -> Vec<Claim> {
                v.iter().filter(|c| c.is_confirmed()).cloned().collect()
            };

            let mut a = OccupancyStore::new();
            a.extend(confirmed(&original));
            let mut b = OccupancyStore::new();
            b.extend(confirmed(&permuted));

            prop_assert_eq!(a.snapshot(), b.snapshot());
        }
    }
}
